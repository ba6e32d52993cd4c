//! The lowered program both backends emit from.
//!
//! Every name is already resolved: a [`Binding`] is either a property of the ambient scope
//! or a slot in an activation `depth` boundaries out. Builder instances (formatters,
//! formatter caches, importers) are referenced by index into the tables of [`Program`].

use crate::literal::LiteralId;
use crate::runtime::ops::{BinaryOp, UnaryOp};
use crate::value::Name;
use smol_str::SmolStr;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Scope(Name),
    Slot { depth: usize, index: usize },
}

/// How a boundary is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The boundary gets a child of the ambient scope.
    pub context: bool,
    /// Local slots of the boundary's activation.
    pub slots: usize,
    /// Bindings copied on entry: `(inside, outside)`, with `outside` resolved from the
    /// enclosing boundary.
    pub inherit: Vec<(Binding, Binding)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralId),
    Load(Binding),
    SelfRef,
    Array(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Member(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Bind(Box<Expr>, Vec<Expr>),
    /// Interpolation with a formatter built once from a literal format string.
    Format { formatter: usize, data: Box<Expr> },
    /// Interpolation with a format string only known at render time.
    DynamicFormat {
        cache: usize,
        format: Box<Expr>,
        data: Box<Expr>,
    },
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Closure(Rc<Partial>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub name: Name,
    pub frame: Frame,
    pub params: Vec<Binding>,
    pub body: Block,
    /// Where the previously bound partial of the same name is read from, for chains that
    /// end by delegating.
    pub previous: Option<Binding>,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub struct LoopRange {
    pub value: Binding,
    pub key: Option<Binding>,
    pub collection: Expr,
    pub guard: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub frame: Frame,
    pub ranges: Vec<LoopRange>,
    pub body: Block,
    pub otherwise: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportBinding {
    Whole(Binding),
    Names(Vec<(Name, Binding)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Evaluated; the value becomes the block's value.
    Expr(Expr),
    Output(Expr),
    Raw(SmolStr),
    OpenTag {
        name: Expr,
        attrs: Option<Expr>,
        self_close: bool,
    },
    CloseTag(Expr),
    Comment(Expr),
    DocType(Expr),
    Store(Binding, Expr),
    If {
        cond: Expr,
        then: Block,
        otherwise: Option<Block>,
    },
    For(Rc<Loop>),
    Using {
        frame: Frame,
        exprs: Vec<Expr>,
        body: Block,
    },
    Import {
        importer: usize,
        binding: ImportBinding,
    },
    Delegate,
}

/// A fully lowered template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Block,
    pub root_slots: usize,
    /// Distinct literal format strings, one formatter each.
    pub formatters: Vec<LiteralId>,
    /// Number of dynamic format sites.
    pub caches: usize,
    /// Distinct imported module names, one importer each.
    pub importers: Vec<Name>,
    pub cache_imports: bool,
}
