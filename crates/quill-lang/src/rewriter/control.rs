use super::Context;
use crate::ast::node::{ForLoop, Node, NodeRef, statements};
use crate::runtime::ops;
use std::rc::Rc;

/// An `if` with a literal condition becomes the branch it would take.
///
/// The branch stays a nested statement list until flattening splices it into its parent.
pub(super) fn fold_if(cx: &mut Context<'_>, node: &NodeRef) -> Option<NodeRef> {
    let Node::If { cond, then, otherwise } = &**node else {
        return None;
    };
    let cond = cx.value(cond)?;
    Some(if ops::truthy(&cond) {
        Rc::clone(then)
    } else {
        otherwise.clone().unwrap_or_else(|| statements(Vec::new()))
    })
}

fn only_loop(body: &Node) -> Option<&Rc<ForLoop>> {
    match body {
        Node::For(inner) => Some(inner),
        Node::Statements(items) => match items.as_slice() {
            [item] => only_loop(item),
            _ => None,
        },
        _ => None,
    }
}

/// `for a in x { for b in y { … } }` becomes `for a in x, b in y { … }` when neither loop
/// has an `else` block.
pub(super) fn roll_up(node: &NodeRef) -> Option<NodeRef> {
    let Node::For(outer) = &**node else {
        return None;
    };
    if outer.otherwise.is_some() {
        return None;
    }
    let inner = only_loop(&outer.body)?;
    if inner.otherwise.is_some() {
        return None;
    }

    Some(Rc::new(Node::For(Rc::new(ForLoop {
        id: outer.id,
        ranges: outer.ranges.iter().chain(&inner.ranges).cloned().collect(),
        body: Rc::clone(&inner.body),
        otherwise: None,
    }))))
}

/// Splices nested statement lists into their parent.
pub(super) fn flatten(items: &[NodeRef]) -> Option<Vec<NodeRef>> {
    if !items.iter().any(|item| matches!(**item, Node::Statements(_))) {
        return None;
    }

    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match &**item {
            Node::Statements(nested) => flat.extend(nested.iter().cloned()),
            _ => flat.push(Rc::clone(item)),
        }
    }
    Some(flat)
}
