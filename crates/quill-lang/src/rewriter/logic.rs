use crate::ast::node::{Node, NodeRef, statements};
use crate::runtime::ops::UnaryOp;
use std::rc::Rc;

fn negated(node: &Node) -> Option<&NodeRef> {
    match node {
        Node::Unary(UnaryOp::Not, inner) => Some(inner),
        _ => None,
    }
}

/// `not c ? a : b` becomes `c ? b : a`; the same for `if` statements.
pub(super) fn conditional_flip(node: &NodeRef) -> Option<NodeRef> {
    match &**node {
        Node::Conditional { cond, then, otherwise } => Some(Rc::new(Node::Conditional {
            cond: Rc::clone(negated(cond)?),
            then: Rc::clone(otherwise),
            otherwise: Rc::clone(then),
        })),
        Node::If { cond, then, otherwise } => Some(Rc::new(Node::If {
            cond: Rc::clone(negated(cond)?),
            then: otherwise.clone().unwrap_or_else(|| statements(Vec::new())),
            otherwise: Some(Rc::clone(then)),
        })),
        _ => None,
    }
}

/// `not (a == b)` becomes `a != b`, and likewise for the other invertible operators.
pub(super) fn equality_flip(node: &NodeRef) -> Option<NodeRef> {
    match &**negated(node)? {
        Node::Binary(op, l, r) => Some(Rc::new(Node::Binary(op.inverse()?, Rc::clone(l), Rc::clone(r)))),
        _ => None,
    }
}

/// De Morgan: `not a and not b` becomes `not (a or b)`.
pub(super) fn not_promotion(node: &NodeRef) -> Option<NodeRef> {
    let promoted = match &**node {
        Node::And(l, r) => Node::Or(Rc::clone(negated(l)?), Rc::clone(negated(r)?)),
        Node::Or(l, r) => Node::And(Rc::clone(negated(l)?), Rc::clone(negated(r)?)),
        _ => return None,
    };
    Some(Rc::new(Node::Unary(UnaryOp::Not, Rc::new(promoted))))
}
