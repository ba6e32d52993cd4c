//! Markup strings shared by the string writer and compile-time raw promotion.

use super::escape::Escape;
use crate::value::{Dict, Value};
use std::borrow::Cow;

/// Renders an attribute list. Nil and `false` omit the attribute, `true` renders the bare
/// name, anything else is stringified and escaped.
pub fn attributes(attrs: &Value, escape: &impl Escape) -> String {
    let dict: Cow<'_, Dict> = match attrs {
        Value::Object(dict) => Cow::Borrowed(dict.as_ref()),
        Value::Scope(scope) => Cow::Owned(scope.own_entries()),
        _ => return String::new(),
    };

    let mut rendered = String::new();
    for (name, value) in dict.iter() {
        match value {
            Value::Nil | Value::Bool(false) => {}
            Value::Bool(true) => {
                rendered.push(' ');
                rendered.push_str(name);
            }
            value => {
                rendered.push(' ');
                rendered.push_str(name);
                rendered.push_str("=\"");
                rendered.push_str(&escape.attribute(&value.to_string()));
                rendered.push('"');
            }
        }
    }
    rendered
}

pub fn open_tag(tag: &str, attrs: &Value, self_close: bool, escape: &impl Escape) -> String {
    format!(
        "<{tag}{}{}>",
        attributes(attrs, escape),
        if self_close { "/" } else { "" }
    )
}

pub fn close_tag(tag: &str) -> String {
    format!("</{tag}>")
}

pub fn comment(text: &Value) -> String {
    format!("<!--{text}-->")
}

pub fn doc_type(root: &str) -> String {
    format!("<!DOCTYPE {root}>")
}
