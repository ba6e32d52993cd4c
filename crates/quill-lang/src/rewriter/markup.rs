use super::Context;
use crate::ast::node::{Node, NodeRef};
use crate::runtime::escape::{Escape, Uncached};
use crate::runtime::markup;
use crate::value::Value;
use smol_str::SmolStr;
use std::rc::Rc;

/// Renders output and markup statements with literal operands at compile time.
pub(super) fn promote(cx: &mut Context<'_>, node: &NodeRef) -> Option<NodeRef> {
    let text: SmolStr = match &**node {
        Node::Output(e) => Uncached.content(&cx.value(e)?.to_string()),
        Node::OpenTag {
            name,
            attrs,
            self_close,
        } => {
            let attrs = match attrs {
                Some(attrs) => cx.value(attrs)?,
                None => Value::Nil,
            };
            markup::open_tag(&cx.value(name)?.to_string(), &attrs, *self_close, &Uncached).into()
        }
        Node::CloseTag(name) => markup::close_tag(&cx.value(name)?.to_string()).into(),
        Node::Comment(text) => markup::comment(&cx.value(text)?).into(),
        Node::DocType(root) => markup::doc_type(&cx.value(root)?.to_string()).into(),
        _ => return None,
    };
    Some(Rc::new(Node::Raw(text)))
}

/// Concatenates adjacent raw statements.
pub(super) fn merge_raw(items: &[NodeRef]) -> Option<Vec<NodeRef>> {
    let adjacent = items
        .windows(2)
        .any(|pair| matches!((&*pair[0], &*pair[1]), (Node::Raw(_), Node::Raw(_))));
    if !adjacent {
        return None;
    }

    let mut merged: Vec<NodeRef> = Vec::with_capacity(items.len());
    let mut pending = String::new();
    let mut run = 0;

    for item in items {
        match &**item {
            Node::Raw(text) => {
                pending.push_str(text);
                run += 1;
                if run == 1 {
                    merged.push(Rc::clone(item));
                }
            }
            _ => {
                flush(&mut merged, &mut pending, run);
                run = 0;
                merged.push(Rc::clone(item));
            }
        }
    }
    flush(&mut merged, &mut pending, run);
    Some(merged)
}

// Replaces the placeholder pushed for the first raw statement of a run.
fn flush(merged: &mut Vec<NodeRef>, pending: &mut String, run: usize) {
    let text = std::mem::take(pending);
    match merged.last_mut() {
        Some(last) if run > 1 => *last = Rc::new(Node::Raw(text.into())),
        _ => {}
    }
}
