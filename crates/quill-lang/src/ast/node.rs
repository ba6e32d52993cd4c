use crate::literal::LiteralId;
use crate::runtime::ops::{BinaryOp, UnaryOp};
use crate::value::Name;
use smol_str::SmolStr;
use std::{fmt, rc::Rc};

pub type NodeRef = Rc<Node>;

/// Identifies a scope boundary (partial, loop, `using` block) or the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Operator,
    Identifier,
    Literal,
    AutoInterpolated,
}

/// A classified token produced by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub value: SmolStr,
    pub kind: SymbolKind,
}

/// A partial definition, also the payload of a lowered closure.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDef {
    pub id: ScopeId,
    pub name: Name,
    pub params: Vec<Name>,
    pub guard: Option<NodeRef>,
    pub body: NodeRef,
    /// The body delegates to the previously bound partial of the same name when its guard
    /// chain falls through.
    pub delegates: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub value: Name,
    pub key: Option<Name>,
    pub collection: NodeRef,
    pub guard: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub id: ScopeId,
    pub ranges: Vec<Range>,
    pub body: NodeRef,
    pub otherwise: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub module: Name,
    pub alias: Option<Name>,
}

/// The tagged syntax tree. One variant per wire opcode, plus the nodes the rewriter
/// introduces (`Closure`, `Delegate`).
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(LiteralId),
    Ident(Name),
    SelfRef,
    Array(Vec<NodeRef>),
    Dict(Vec<(NodeRef, NodeRef)>),
    Member {
        object: NodeRef,
        property: NodeRef,
    },
    Call {
        target: NodeRef,
        args: Vec<NodeRef>,
    },
    Bind {
        target: NodeRef,
        args: Vec<NodeRef>,
    },
    Format {
        format: NodeRef,
        data: NodeRef,
        auto: bool,
    },
    Conditional {
        cond: NodeRef,
        then: NodeRef,
        otherwise: NodeRef,
    },
    Or(NodeRef, NodeRef),
    And(NodeRef, NodeRef),
    Binary(BinaryOp, NodeRef, NodeRef),
    Unary(UnaryOp, NodeRef),
    Closure(Rc<PartialDef>),

    Statements(Vec<NodeRef>),
    Expression(NodeRef),
    Assign(Vec<(Name, NodeRef)>),
    Partial(Rc<PartialDef>),
    For(Rc<ForLoop>),
    If {
        cond: NodeRef,
        then: NodeRef,
        otherwise: Option<NodeRef>,
    },
    Using {
        id: ScopeId,
        exprs: Vec<NodeRef>,
        body: NodeRef,
    },
    Output(NodeRef),
    Raw(SmolStr),
    OpenTag {
        name: NodeRef,
        attrs: Option<NodeRef>,
        self_close: bool,
    },
    CloseTag(NodeRef),
    Comment(NodeRef),
    DocType(NodeRef),
    Import(Vec<ImportSpec>),
    FromImport {
        module: Name,
        names: Vec<(Name, Option<Name>)>,
    },
    Delegate,
}

impl Node {
    pub fn literal_id(&self) -> Option<LiteralId> {
        match self {
            Node::Literal(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Node::Statements(_)
                | Node::Expression(_)
                | Node::Assign(_)
                | Node::Partial(_)
                | Node::For(_)
                | Node::If { .. }
                | Node::Using { .. }
                | Node::Output(_)
                | Node::Raw(_)
                | Node::OpenTag { .. }
                | Node::CloseTag(_)
                | Node::Comment(_)
                | Node::DocType(_)
                | Node::Import(_)
                | Node::FromImport { .. }
                | Node::Delegate
        )
    }

    /// The wire opcode of this node; `None` for nodes without a tag.
    pub fn tag(&self) -> Option<&'static str> {
        Some(match self {
            Node::Literal(_) | Node::Statements(_) | Node::Closure(_) | Node::Delegate => return None,
            Node::Ident(_) => "id",
            Node::SelfRef => "se",
            Node::Array(_) => "ar",
            Node::Dict(_) => "dc",
            Node::Member { .. } => "mb",
            Node::Call { .. } => "ca",
            Node::Bind { .. } => "bi",
            Node::Format { .. } => "fm",
            Node::Conditional { .. } => "cn",
            Node::Or(..) => "or",
            Node::And(..) => "an",
            Node::Binary(op, ..) => op.tag(),
            Node::Unary(op, _) => op.tag(),
            Node::Expression(_) => "ev",
            Node::Assign(_) => "as",
            Node::Partial(_) => "de",
            Node::For(_) => "fr",
            Node::If { .. } => "if",
            Node::Using { .. } => "us",
            Node::Output(_) => "op",
            Node::Raw(_) => "ra",
            Node::OpenTag { .. } => "oe",
            Node::CloseTag(_) => "ce",
            Node::Comment(_) => "ct",
            Node::DocType(_) => "dt",
            Node::Import(_) => "im",
            Node::FromImport { .. } => "mi",
        })
    }

    /// Rebuilds this node with every direct child passed through `f`.
    ///
    /// Returns `None` when no child changed, so callers can keep sharing the original.
    pub fn map_children(&self, f: &mut impl FnMut(&NodeRef) -> NodeRef) -> Option<Node> {
        let mut changed = false;
        let mut map = |node: &NodeRef| {
            let mapped = f(node);
            changed |= !Rc::ptr_eq(node, &mapped);
            mapped
        };

        let rebuilt = match self {
            Node::Literal(_)
            | Node::Ident(_)
            | Node::SelfRef
            | Node::Raw(_)
            | Node::Import(_)
            | Node::FromImport { .. }
            | Node::Delegate => return None,
            Node::Array(items) => Node::Array(items.iter().map(&mut map).collect()),
            Node::Dict(entries) => Node::Dict(entries.iter().map(|(k, v)| (map(k), map(v))).collect()),
            Node::Member { object, property } => Node::Member {
                object: map(object),
                property: map(property),
            },
            Node::Call { target, args } => Node::Call {
                target: map(target),
                args: args.iter().map(&mut map).collect(),
            },
            Node::Bind { target, args } => Node::Bind {
                target: map(target),
                args: args.iter().map(&mut map).collect(),
            },
            Node::Format { format, data, auto } => Node::Format {
                format: map(format),
                data: map(data),
                auto: *auto,
            },
            Node::Conditional { cond, then, otherwise } => Node::Conditional {
                cond: map(cond),
                then: map(then),
                otherwise: map(otherwise),
            },
            Node::Or(l, r) => Node::Or(map(l), map(r)),
            Node::And(l, r) => Node::And(map(l), map(r)),
            Node::Binary(op, l, r) => Node::Binary(*op, map(l), map(r)),
            Node::Unary(op, e) => Node::Unary(*op, map(e)),
            Node::Closure(def) => Node::Closure(Rc::new(map_partial(def, &mut map))),
            Node::Partial(def) => Node::Partial(Rc::new(map_partial(def, &mut map))),
            Node::Statements(items) => Node::Statements(items.iter().map(&mut map).collect()),
            Node::Expression(e) => Node::Expression(map(e)),
            Node::Assign(bindings) => {
                Node::Assign(bindings.iter().map(|(n, v)| (n.clone(), map(v))).collect())
            }
            Node::For(l) => Node::For(Rc::new(ForLoop {
                id: l.id,
                ranges: l
                    .ranges
                    .iter()
                    .map(|r| Range {
                        value: r.value.clone(),
                        key: r.key.clone(),
                        collection: map(&r.collection),
                        guard: r.guard.as_ref().map(&mut map),
                    })
                    .collect(),
                body: map(&l.body),
                otherwise: l.otherwise.as_ref().map(&mut map),
            })),
            Node::If { cond, then, otherwise } => Node::If {
                cond: map(cond),
                then: map(then),
                otherwise: otherwise.as_ref().map(&mut map),
            },
            Node::Using { id, exprs, body } => Node::Using {
                id: *id,
                exprs: exprs.iter().map(&mut map).collect(),
                body: map(body),
            },
            Node::Output(e) => Node::Output(map(e)),
            Node::OpenTag {
                name,
                attrs,
                self_close,
            } => Node::OpenTag {
                name: map(name),
                attrs: attrs.as_ref().map(&mut map),
                self_close: *self_close,
            },
            Node::CloseTag(e) => Node::CloseTag(map(e)),
            Node::Comment(e) => Node::Comment(map(e)),
            Node::DocType(e) => Node::DocType(map(e)),
        };

        changed.then_some(rebuilt)
    }

    /// Visits every direct child in evaluation order.
    pub fn for_each_child(&self, f: &mut impl FnMut(&NodeRef)) {
        match self {
            Node::Literal(_)
            | Node::Ident(_)
            | Node::SelfRef
            | Node::Raw(_)
            | Node::Import(_)
            | Node::FromImport { .. }
            | Node::Delegate => {}
            Node::Array(items) | Node::Statements(items) => items.iter().for_each(f),
            Node::Dict(entries) => entries.iter().for_each(|(k, v)| {
                f(k);
                f(v);
            }),
            Node::Member { object, property } => {
                f(object);
                f(property);
            }
            Node::Call { target, args } | Node::Bind { target, args } => {
                f(target);
                args.iter().for_each(f);
            }
            Node::Format { format, data, .. } => {
                f(format);
                f(data);
            }
            Node::Conditional { cond, then, otherwise } => {
                f(cond);
                f(then);
                f(otherwise);
            }
            Node::Or(l, r) | Node::And(l, r) | Node::Binary(_, l, r) => {
                f(l);
                f(r);
            }
            Node::Unary(_, e)
            | Node::Expression(e)
            | Node::Output(e)
            | Node::CloseTag(e)
            | Node::Comment(e)
            | Node::DocType(e) => f(e),
            Node::Closure(def) | Node::Partial(def) => {
                def.guard.iter().for_each(&mut *f);
                f(&def.body);
            }
            Node::Assign(bindings) => bindings.iter().for_each(|(_, v)| f(v)),
            Node::For(l) => {
                for range in &l.ranges {
                    f(&range.collection);
                    range.guard.iter().for_each(&mut *f);
                }
                f(&l.body);
                l.otherwise.iter().for_each(f);
            }
            Node::If { cond, then, otherwise } => {
                f(cond);
                f(then);
                otherwise.iter().for_each(f);
            }
            Node::Using { exprs, body, .. } => {
                exprs.iter().for_each(&mut *f);
                f(body);
            }
            Node::OpenTag { name, attrs, .. } => {
                f(name);
                attrs.iter().for_each(f);
            }
        }
    }
}

fn map_partial(def: &PartialDef, map: &mut impl FnMut(&NodeRef) -> NodeRef) -> PartialDef {
    PartialDef {
        id: def.id,
        name: def.name.clone(),
        params: def.params.clone(),
        guard: def.guard.as_ref().map(&mut *map),
        body: map(&def.body),
        delegates: def.delegates,
    }
}

/// Wraps a list of statements in a block node.
pub fn statements(items: Vec<NodeRef>) -> NodeRef {
    Rc::new(Node::Statements(items))
}
