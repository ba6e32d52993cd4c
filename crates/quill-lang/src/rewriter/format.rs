use super::{Context, WarningKind};
use crate::ast::node::{Node, NodeRef};
use crate::runtime::format::Formatter;
use crate::value::Value;
use std::rc::Rc;

/// Replaces `self` as interpolation data with a dictionary of exactly the names the literal
/// format reads.
///
/// A format without placeholders becomes its static text. Formats using positional
/// placeholders index into the data itself and are left alone.
pub(super) fn specialize(cx: &mut Context<'_>, node: &NodeRef) -> Option<NodeRef> {
    let Node::Format { format, data, auto } = &**node else {
        return None;
    };
    if !matches!(**data, Node::SelfRef) {
        return None;
    }
    let Value::String(source) = cx.value(format)? else {
        return None;
    };

    let formatter = Formatter::build(&source);
    if !formatter.has_placeholders() {
        if !auto {
            cx.warn(
                WarningKind::FormatWithoutPlaceholders,
                format!("Format \"{source}\" reads nothing from self"),
            );
        }
        return Some(cx.literal(Value::from(formatter.static_text().unwrap_or_default())));
    }
    if formatter.has_positional() {
        return None;
    }

    let entries = formatter
        .required_names()
        .into_iter()
        .map(|name| (cx.literal(Value::String(name.clone())), Rc::new(Node::Ident(name))))
        .collect();
    Some(Rc::new(Node::Format {
        format: Rc::clone(format),
        data: Rc::new(Node::Dict(entries)),
        auto: *auto,
    }))
}
