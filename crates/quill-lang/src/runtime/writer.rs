use super::error::RuntimeError;
use super::escape::{Escape, Escaper};
use super::function::{Call, exec};
use super::markup;
use crate::value::Value;

/// An output sink for rendering.
///
/// `content` escapes, `raw` writes verbatim. Attribute values passed to the element
/// methods are objects (or scopes) whose entries become attributes.
pub trait Writer {
    fn start_render(&mut self) {}

    /// Finishes a render and returns the accumulated text, if the writer keeps any.
    fn end_render(&mut self) -> String {
        String::new()
    }

    fn start_element(&mut self, tag: &str, attrs: &Value);
    fn self_close_element(&mut self, tag: &str, attrs: &Value);
    fn end_element(&mut self, tag: &str);
    fn comment(&mut self, text: &Value);
    fn doc_type(&mut self, root: &str);
    fn content(&mut self, value: &Value);
    fn raw(&mut self, text: &str);
}

/// Accumulates markup into a string.
#[derive(Debug, Default)]
pub struct StringWriter {
    buffer: String,
    escaper: Escaper,
}

impl StringWriter {
    pub fn new(escaper: Escaper) -> Self {
        Self {
            buffer: String::new(),
            escaper,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl Writer for StringWriter {
    fn start_render(&mut self) {
        self.buffer.clear();
    }

    fn end_render(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    fn start_element(&mut self, tag: &str, attrs: &Value) {
        self.buffer
            .push_str(&markup::open_tag(tag, attrs, false, &self.escaper));
    }

    fn self_close_element(&mut self, tag: &str, attrs: &Value) {
        self.buffer
            .push_str(&markup::open_tag(tag, attrs, true, &self.escaper));
    }

    fn end_element(&mut self, tag: &str) {
        self.buffer.push_str(&markup::close_tag(tag));
    }

    fn comment(&mut self, text: &Value) {
        self.buffer.push_str(&markup::comment(text));
    }

    fn doc_type(&mut self, root: &str) {
        self.buffer.push_str(&markup::doc_type(root));
    }

    fn content(&mut self, value: &Value) {
        let text = value.to_string();
        self.buffer.push_str(&self.escaper.content(&text));
    }

    fn raw(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// Discards everything; used for export probing and pipes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

impl Writer for NullWriter {
    fn start_element(&mut self, _tag: &str, _attrs: &Value) {}
    fn self_close_element(&mut self, _tag: &str, _attrs: &Value) {}
    fn end_element(&mut self, _tag: &str) {}
    fn comment(&mut self, _text: &Value) {}
    fn doc_type(&mut self, _root: &str) {}
    fn content(&mut self, _value: &Value) {}
    fn raw(&mut self, _text: &str) {}
}

/// Writes the value of an output statement.
///
/// Blessed functions are invoked without arguments and their result is written raw;
/// everything else is escaped content.
pub fn output(call: &mut Call<'_>, value: &Value) -> Result<(), RuntimeError> {
    match value {
        Value::Function(f) if f.is_blessed() => {
            let rendered = exec(call, value, &[])?;
            call.writer.raw(&rendered.to_string());
        }
        Value::Function(_) => {}
        value => call.writer.content(value),
    }
    Ok(())
}

/// Writes an open element statement whose parts are only known at render time.
pub fn open_element(call: &mut Call<'_>, tag: &Value, attrs: &Value, self_close: bool) {
    let tag = tag.to_string();
    if self_close {
        call.writer.self_close_element(&tag, attrs);
    } else {
        call.writer.start_element(&tag, attrs);
    }
}

pub fn close_element(call: &mut Call<'_>, tag: &Value) {
    call.writer.end_element(&tag.to_string());
}

pub fn comment(call: &mut Call<'_>, text: &Value) {
    call.writer.comment(text);
}

pub fn doc_type(call: &mut Call<'_>, root: &Value) {
    call.writer.doc_type(&root.to_string());
}
