use super::Context;
use crate::ast::node::{Node, NodeRef};
use crate::runtime::ops;
use crate::value::{Dict, Name, Value};
use std::rc::Rc;

/// `or`, `an` and `cn` with a literal left operand or condition pick an operand statically.
pub(super) fn short_circuit(cx: &mut Context<'_>, node: &NodeRef) -> Option<NodeRef> {
    match &**node {
        Node::Or(l, r) => {
            let left = cx.value(l)?;
            Some(if ops::truthy(&left) { Rc::clone(l) } else { Rc::clone(r) })
        }
        Node::And(l, r) => {
            let left = cx.value(l)?;
            Some(if ops::truthy(&left) { Rc::clone(r) } else { Rc::clone(l) })
        }
        Node::Conditional { cond, then, otherwise } => {
            let cond = cx.value(cond)?;
            Some(if ops::truthy(&cond) {
                Rc::clone(then)
            } else {
                Rc::clone(otherwise)
            })
        }
        _ => None,
    }
}

/// Operators over literal operands are evaluated with the same functions rendering uses.
pub(super) fn constant(cx: &mut Context<'_>, node: &NodeRef) -> Option<NodeRef> {
    let value = match &**node {
        Node::Binary(op, l, r) => ops::binary(*op, &cx.value(l)?, &cx.value(r)?),
        Node::Unary(op, e) => ops::unary(*op, &cx.value(e)?),
        _ => return None,
    };
    Some(cx.literal(value))
}

/// Arrays and dictionaries built only from literals become literals themselves.
pub(super) fn hoist_literal(cx: &mut Context<'_>, node: &NodeRef) -> Option<NodeRef> {
    let value = match &**node {
        Node::Array(items) => Value::array(
            items
                .iter()
                .map(|item| cx.value(item))
                .collect::<Option<Vec<_>>>()?,
        ),
        Node::Dict(entries) => Value::object(
            entries
                .iter()
                .map(|(k, v)| Some((Name::from(cx.value(k)?.to_string()), cx.value(v)?)))
                .collect::<Option<Dict>>()?,
        ),
        _ => return None,
    };
    Some(cx.literal(value))
}
