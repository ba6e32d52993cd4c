use super::cache::BoundedCache;
use smol_str::SmolStr;
use std::{borrow::Cow, cell::RefCell, rc::Rc};

/// Escapes `&`, `<` and `>` for element content.
pub fn escape_content(input: &str) -> Cow<'_, str> {
    escape(input, false)
}

/// Escapes `&`, `<`, `>`, `'` and `"` for attribute values.
pub fn escape_attribute(input: &str) -> Cow<'_, str> {
    escape(input, true)
}

fn escape(input: &str, attribute: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| matches!(c, '&' | '<' | '>') || (attribute && matches!(c, '\'' | '"'));

    if !input.contains(needs_escape) {
        return Cow::Borrowed(input);
    }

    let mut escaped = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            '\'' if attribute => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escaping strategy used when rendering markup.
pub trait Escape {
    fn content(&self, input: &str) -> SmolStr;
    fn attribute(&self, input: &str) -> SmolStr;
}

/// Escapes without caching; used at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncached;

impl Escape for Uncached {
    fn content(&self, input: &str) -> SmolStr {
        SmolStr::new(escape_content(input))
    }

    fn attribute(&self, input: &str) -> SmolStr {
        SmolStr::new(escape_attribute(input))
    }
}

/// Escaping with one bounded result cache per context.
///
/// Cloning shares the caches.
#[derive(Debug, Clone)]
pub struct Escaper {
    content: Rc<RefCell<BoundedCache<SmolStr, SmolStr>>>,
    attribute: Rc<RefCell<BoundedCache<SmolStr, SmolStr>>>,
}

impl Escaper {
    pub fn new(capacity: usize) -> Self {
        Self {
            content: Rc::new(RefCell::new(BoundedCache::new(capacity))),
            attribute: Rc::new(RefCell::new(BoundedCache::new(capacity))),
        }
    }

    pub fn cached_len(&self) -> (usize, usize) {
        (self.content.borrow().len(), self.attribute.borrow().len())
    }
}

impl Default for Escaper {
    fn default() -> Self {
        Self::new(super::cache::DEFAULT_CAPACITY)
    }
}

impl Escape for Escaper {
    fn content(&self, input: &str) -> SmolStr {
        self.content
            .borrow_mut()
            .get_or_insert_with(input, || SmolStr::new(escape_content(input)))
    }

    fn attribute(&self, input: &str) -> SmolStr {
        self.attribute
            .borrow_mut()
            .get_or_insert_with(input, || SmolStr::new(escape_attribute(input)))
    }
}
