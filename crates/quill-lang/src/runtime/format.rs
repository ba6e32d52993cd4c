use super::Runtime;
use super::cache::BoundedCache;
use super::error::RuntimeError;
use super::function::{Call, pipe};
use crate::value::{Name, Value};
use itertools::Itertools;
use regex_lite::Regex;
use smallvec::SmallVec;
use smol_str::SmolStr;
use std::{
    cell::{OnceCell, RefCell},
    rc::Rc,
    sync::LazyLock,
};

static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"%%|%(?:([1-9][0-9]*)|([A-Za-z_$][A-Za-z0-9_$]*))?((?:\|[A-Za-z_$][A-Za-z0-9_$]*)*)").ok()
});

/// Where a placeholder takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Zero-based position in array data.
    Index(usize),
    Name(Name),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(SmolStr),
    Placeholder { key: Key, pipes: SmallVec<[Name; 2]> },
}

/// A parsed interpolation string.
///
/// `%%` is a literal percent sign, a bare `%` takes the next position (starting at 1),
/// `%N` a fixed position and `%name` a named value. Any placeholder may be followed by
/// `|fn` pipes, which apply right to left.
#[derive(Debug, Clone, PartialEq)]
pub struct Formatter {
    segments: Vec<Segment>,
}

impl Formatter {
    pub fn build(format: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut next_index = 0;
        let mut last = 0;

        if let Some(re) = PLACEHOLDER.as_ref() {
            for caps in re.captures_iter(format) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                text.push_str(&format[last..whole.start()]);
                last = whole.end();

                if whole.as_str() == "%%" {
                    text.push('%');
                    continue;
                }

                let key = if let Some(index) = caps.get(1) {
                    Key::Index(index.as_str().parse::<usize>().unwrap_or(1).saturating_sub(1))
                } else if let Some(name) = caps.get(2) {
                    Key::Name(name.as_str().into())
                } else {
                    next_index += 1;
                    Key::Index(next_index - 1)
                };
                let pipes = caps
                    .get(3)
                    .map(|m| {
                        m.as_str()
                            .split('|')
                            .filter(|p| !p.is_empty())
                            .map(Name::from)
                            .collect()
                    })
                    .unwrap_or_default();

                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text).into()));
                }
                segments.push(Segment::Placeholder { key, pipes });
            }
        }

        text.push_str(&format[last..]);
        if !text.is_empty() {
            segments.push(Segment::Text(text.into()));
        }

        Self { segments }
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder { .. }))
    }

    pub fn has_positional(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(
                s,
                Segment::Placeholder {
                    key: Key::Index(_),
                    ..
                }
            )
        })
    }

    /// The text of a formatter without placeholders, with `%%` already unescaped.
    pub fn static_text(&self) -> Option<String> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(text) => Some(text.as_str()),
                Segment::Placeholder { .. } => None,
            })
            .collect()
    }

    /// Every name read from the data: named placeholders, then pipe functions.
    pub fn required_names(&self) -> Vec<Name> {
        let placeholders = self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { key: Key::Name(name), .. } => Some(name.clone()),
            _ => None,
        });
        let pipes = self.segments.iter().flat_map(|s| match s {
            Segment::Placeholder { pipes, .. } => pipes.to_vec(),
            Segment::Text(_) => Vec::new(),
        });
        placeholders.chain(pipes).unique().collect()
    }

    pub fn format(&self, call: &mut Call<'_>, data: &Value) -> Result<Value, RuntimeError> {
        let mut rendered = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Placeholder { key, pipes } => {
                    let mut value = lookup(data, key);
                    for name in pipes.iter().rev() {
                        let func = match data.property(name) {
                            Value::Nil => call.runtime.globals().get(name),
                            func => func,
                        };
                        if func.is_nil() {
                            if call.scope.is_probing() {
                                value = Value::Nil;
                                continue;
                            }
                            return Err(RuntimeError::PipeNotFound(name.clone()));
                        }
                        value = pipe(call, &func, value)?;
                    }
                    rendered.push_str(&value.to_string());
                }
            }
        }

        Ok(Value::from(rendered))
    }
}

fn lookup(data: &Value, key: &Key) -> Value {
    match (data, key) {
        (Value::Array(values), Key::Index(i)) => values.get(*i).cloned().unwrap_or_default(),
        (Value::Object(_) | Value::Scope(_), Key::Index(i)) => data.property(&(i + 1).to_string()),
        (Value::Object(_) | Value::Scope(_), Key::Name(name)) => data.property(name),
        (Value::Nil, _) => Value::Nil,
        (Value::Array(_), Key::Name(_)) => Value::Nil,
        (scalar, Key::Index(0)) => scalar.clone(),
        _ => Value::Nil,
    }
}

/// Formatters for strings only known at render time, memoized per call site.
#[derive(Debug, Default)]
pub struct FormatterCache {
    cache: OnceCell<RefCell<BoundedCache<SmolStr, Rc<Formatter>>>>,
}

impl FormatterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn formatter(&self, runtime: &Runtime, format: &str) -> Rc<Formatter> {
        self.cache
            .get_or_init(|| RefCell::new(BoundedCache::new(runtime.options().formatter_cache_size)))
            .borrow_mut()
            .get_or_insert_with(format, || Rc::new(Formatter::build(format)))
    }

    pub fn format(&self, call: &mut Call<'_>, format: &Value, data: &Value) -> Result<Value, RuntimeError> {
        let formatter = self.formatter(call.runtime, &format.to_string());
        formatter.format(call, data)
    }

    pub fn len(&self) -> usize {
        self.cache.get().map(|c| c.borrow().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{RuntimeOptions, function::bless, function::Function, writer::NullWriter};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn runtime() -> Runtime {
        let runtime = Runtime::new();
        runtime.define_global(
            "upper",
            bless(Value::Function(Function::new(|_, args| {
                Ok(Value::from(args[0].to_string().to_uppercase()))
            }))),
        );
        runtime.define_global(
            "exclaim",
            bless(Value::Function(Function::new(|_, args| {
                Ok(Value::from(format!("{}!", args[0])))
            }))),
        );
        runtime.define_global(
            "count",
            bless(Value::Function(Function::new(|_, args| {
                Ok(Value::from(args[0].to_string().chars().count()))
            }))),
        );
        runtime
    }

    fn render(runtime: &Runtime, format: &str, data: serde_json::Value) -> Result<Value, RuntimeError> {
        let mut writer = NullWriter;
        let mut call = Call::new(runtime, runtime.globals().extend(), &mut writer);
        Formatter::build(format).format(&mut call, &Value::from_json(&data))
    }

    #[rstest]
    #[case("% is the new %", json!(["red", "black"]), "red is the new black")]
    #[case("%2 is the new %1", json!(["red", "black"]), "black is the new red")]
    #[case("100%% sure", json!([]), "100% sure")]
    #[case("Hello, %name", json!({"name": "World"}), "Hello, World")]
    #[case("Hi %", json!("Thom"), "Hi Thom")]
    #[case("%3", json!(["a"]), "")]
    #[case("%name|upper", json!({"name": "quill"}), "QUILL")]
    #[case("%name|exclaim|upper", json!({"name": "a"}), "A!")]
    #[case("%name|count|exclaim", json!({"name": "ab"}), "3")]
    #[case("no placeholders", json!(null), "no placeholders")]
    fn test_format(runtime: Runtime, #[case] format: &str, #[case] data: serde_json::Value, #[case] expected: &str) {
        assert_eq!(render(&runtime, format, data), Ok(Value::from(expected)));
    }

    #[rstest]
    fn test_pipe_from_data_wins(runtime: Runtime) {
        let data = Value::object(
            [
                ("x".into(), Value::from("v")),
                (
                    "upper".into(),
                    bless(Value::Function(Function::new(|_, _| Ok(Value::from("local"))))),
                ),
            ]
            .into_iter()
            .collect(),
        );
        let mut writer = NullWriter;
        let mut call = Call::new(&runtime, runtime.globals().extend(), &mut writer);
        assert_eq!(
            Formatter::build("%x|upper").format(&mut call, &data),
            Ok(Value::from("local"))
        );
    }

    #[rstest]
    fn test_missing_pipe(runtime: Runtime) {
        assert_eq!(
            render(&runtime, "%x|nope", json!({"x": 1})),
            Err(RuntimeError::PipeNotFound("nope".into()))
        );
    }

    #[rstest]
    #[case("Hello, %name|upper and %1 %", vec!["name", "upper"], true)]
    #[case("%a %b %a", vec!["a", "b"], false)]
    #[case("plain %%", vec![], false)]
    fn test_requirements(#[case] format: &str, #[case] names: Vec<&str>, #[case] positional: bool) {
        let formatter = Formatter::build(format);
        assert_eq!(
            formatter.required_names(),
            names.into_iter().map(Name::from).collect::<Vec<_>>()
        );
        assert_eq!(formatter.has_positional(), positional);
    }

    #[test]
    fn test_static_text() {
        assert_eq!(Formatter::build("50%% off").static_text(), Some("50% off".to_string()));
        assert_eq!(Formatter::build("%x").static_text(), None);
    }

    #[test]
    fn test_cache_is_bounded() {
        let runtime = Runtime::with_options(RuntimeOptions {
            formatter_cache_size: 2,
            ..Default::default()
        });
        let cache = FormatterCache::new();
        let first = cache.formatter(&runtime, "%a");
        assert!(Rc::ptr_eq(&first, &cache.formatter(&runtime, "%a")));
        cache.formatter(&runtime, "%b");
        cache.formatter(&runtime, "%c");
        assert_eq!(cache.len(), 1);
    }
}
