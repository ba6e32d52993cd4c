use super::Program;
use super::node::{ForLoop, ImportSpec, Node, NodeRef, PartialDef, Range, ScopeId, statements};
use crate::literal::LiteralTable;
use crate::runtime::ops::{BinaryOp, UnaryOp};
use crate::value::{Name, Value};
use std::rc::Rc;

/// Builds syntax trees without going through the wire format.
///
/// Literals are registered in the builder's table and scope boundaries receive fresh ids,
/// exactly as [`decode`](super::decode) would assign them.
///
/// ```
/// use quill_lang::ast::Builder;
///
/// let mut b = Builder::new();
/// let hello = b.string("Hello");
/// let root = b.statements(vec![b.output(hello)]);
/// let program = b.finish(root);
/// assert_eq!(program.literals.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    literals: LiteralTable,
    next_scope: u32,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues building on top of an existing literal table.
    pub fn with_literals(literals: LiteralTable) -> Self {
        Self {
            literals,
            next_scope: 0,
        }
    }

    fn scope(&mut self) -> ScopeId {
        self.next_scope += 1;
        ScopeId(self.next_scope)
    }

    pub fn finish(self, root: NodeRef) -> Program {
        Program::new(root, self.literals)
    }

    pub fn literal(&mut self, value: impl Into<Value>) -> NodeRef {
        Rc::new(Node::Literal(self.literals.insert(value.into())))
    }

    pub fn string(&mut self, value: &str) -> NodeRef {
        self.literal(value)
    }

    pub fn number(&mut self, value: f64) -> NodeRef {
        self.literal(value)
    }

    pub fn nil(&mut self) -> NodeRef {
        self.literal(Value::Nil)
    }

    pub fn ident(&self, name: &str) -> NodeRef {
        Rc::new(Node::Ident(Name::from(name)))
    }

    pub fn self_ref(&self) -> NodeRef {
        Rc::new(Node::SelfRef)
    }

    pub fn array(&self, items: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::Array(items))
    }

    pub fn dict(&self, entries: Vec<(NodeRef, NodeRef)>) -> NodeRef {
        Rc::new(Node::Dict(entries))
    }

    pub fn member(&mut self, object: NodeRef, property: &str) -> NodeRef {
        let property = self.string(property);
        Rc::new(Node::Member { object, property })
    }

    pub fn call(&self, target: NodeRef, args: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::Call { target, args })
    }

    pub fn bind(&self, target: NodeRef, args: Vec<NodeRef>) -> NodeRef {
        Rc::new(Node::Bind { target, args })
    }

    /// `format % data` with explicit data.
    pub fn format(&self, format: NodeRef, data: NodeRef) -> NodeRef {
        Rc::new(Node::Format {
            format,
            data,
            auto: false,
        })
    }

    /// A string literal interpolated implicitly against `self`.
    pub fn interpolated(&mut self, format: &str) -> NodeRef {
        let format = self.string(format);
        Rc::new(Node::Format {
            format,
            data: self.self_ref(),
            auto: true,
        })
    }

    pub fn conditional(&self, cond: NodeRef, then: NodeRef, otherwise: NodeRef) -> NodeRef {
        Rc::new(Node::Conditional {
            cond,
            then,
            otherwise,
        })
    }

    pub fn or(&self, l: NodeRef, r: NodeRef) -> NodeRef {
        Rc::new(Node::Or(l, r))
    }

    pub fn and(&self, l: NodeRef, r: NodeRef) -> NodeRef {
        Rc::new(Node::And(l, r))
    }

    pub fn binary(&self, op: BinaryOp, l: NodeRef, r: NodeRef) -> NodeRef {
        Rc::new(Node::Binary(op, l, r))
    }

    pub fn not(&self, e: NodeRef) -> NodeRef {
        Rc::new(Node::Unary(UnaryOp::Not, e))
    }

    pub fn neg(&self, e: NodeRef) -> NodeRef {
        Rc::new(Node::Unary(UnaryOp::Neg, e))
    }

    pub fn statements(&self, items: Vec<NodeRef>) -> NodeRef {
        statements(items)
    }

    pub fn expression(&self, e: NodeRef) -> NodeRef {
        Rc::new(Node::Expression(e))
    }

    pub fn assign(&self, name: &str, value: NodeRef) -> NodeRef {
        Rc::new(Node::Assign(vec![(Name::from(name), value)]))
    }

    pub fn partial(&mut self, name: &str, params: &[&str], guard: Option<NodeRef>, body: NodeRef) -> NodeRef {
        Rc::new(Node::Partial(Rc::new(PartialDef {
            id: self.scope(),
            name: Name::from(name),
            params: params.iter().copied().map(Name::from).collect(),
            guard,
            body,
            delegates: false,
        })))
    }

    pub fn range(&self, value: &str, key: Option<&str>, collection: NodeRef, guard: Option<NodeRef>) -> Range {
        Range {
            value: Name::from(value),
            key: key.map(Name::from),
            collection,
            guard,
        }
    }

    pub fn for_loop(&mut self, ranges: Vec<Range>, body: NodeRef, otherwise: Option<NodeRef>) -> NodeRef {
        Rc::new(Node::For(Rc::new(ForLoop {
            id: self.scope(),
            ranges,
            body,
            otherwise,
        })))
    }

    pub fn if_(&self, cond: NodeRef, then: NodeRef, otherwise: Option<NodeRef>) -> NodeRef {
        Rc::new(Node::If {
            cond,
            then,
            otherwise,
        })
    }

    pub fn using(&mut self, exprs: Vec<NodeRef>, body: NodeRef) -> NodeRef {
        Rc::new(Node::Using {
            id: self.scope(),
            exprs,
            body,
        })
    }

    pub fn output(&self, e: NodeRef) -> NodeRef {
        Rc::new(Node::Output(e))
    }

    pub fn raw(&self, text: &str) -> NodeRef {
        Rc::new(Node::Raw(text.into()))
    }

    pub fn open_tag(&mut self, name: &str, attrs: Option<NodeRef>, self_close: bool) -> NodeRef {
        let name = self.string(name);
        Rc::new(Node::OpenTag {
            name,
            attrs,
            self_close,
        })
    }

    pub fn close_tag(&mut self, name: &str) -> NodeRef {
        let name = self.string(name);
        Rc::new(Node::CloseTag(name))
    }

    pub fn comment(&self, content: NodeRef) -> NodeRef {
        Rc::new(Node::Comment(content))
    }

    pub fn doc_type(&mut self, root: &str) -> NodeRef {
        let root = self.string(root);
        Rc::new(Node::DocType(root))
    }

    pub fn import(&self, module: &str, alias: Option<&str>) -> NodeRef {
        Rc::new(Node::Import(vec![ImportSpec {
            module: Name::from(module),
            alias: alias.map(Name::from),
        }]))
    }

    pub fn from_import(&self, module: &str, names: &[(&str, Option<&str>)]) -> NodeRef {
        Rc::new(Node::FromImport {
            module: Name::from(module),
            names: names
                .iter()
                .map(|(name, alias)| (Name::from(*name), alias.map(Name::from)))
                .collect(),
        })
    }
}
