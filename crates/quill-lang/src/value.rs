use crate::number::Number;
use crate::runtime::escape;
use crate::runtime::function::Function;
use crate::runtime::scope::Scope;
use smol_str::SmolStr;
use std::{collections::BTreeMap, fmt, rc::Rc};

/// Identifier and property name.
pub type Name = SmolStr;
/// Object storage; keys are kept ordered so rendering and literal keys are deterministic.
pub type Dict = BTreeMap<Name, Value>;

/// A runtime value.
///
/// `Nil` doubles as "undefined": missing properties, failed imports during probing and
/// member access on nil all produce it.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(Number),
    String(SmolStr),
    Array(Rc<Vec<Value>>),
    Object(Rc<Dict>),
    Scope(Scope),
    Function(Function),
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(values))
    }

    pub fn object(dict: Dict) -> Self {
        Value::Object(Rc::new(dict))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness: nil, `false`, `0`, `NaN`, `""` and `[]` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_falsy(),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(_) | Value::Scope(_) | Value::Function(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Scope(_) => "scope",
            Value::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Reads a named property of an object or scope. Everything else has no properties.
    pub fn property(&self, name: &str) -> Value {
        match self {
            Value::Object(dict) => dict.get(name).cloned().unwrap_or_default(),
            Value::Scope(scope) => scope.get(name),
            _ => Value::Nil,
        }
    }

    /// Literal values are the ones that may live in the literal table.
    pub fn is_literal(&self) -> bool {
        match self {
            Value::Nil | Value::Bool(_) | Value::Number(_) | Value::String(_) => true,
            Value::Array(values) => values.iter().all(Value::is_literal),
            Value::Object(dict) => dict.values().all(Value::is_literal),
            Value::Scope(_) | Value::Function(_) => false,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(Number::new(n.as_f64().unwrap_or(f64::NAN))),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(values) => Value::array(values.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (Name::from(k.as_str()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts to JSON. Functions become `null`; scopes contribute their own entries.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(n.value())
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(values) => serde_json::Value::Array(values.iter().map(Value::to_json).collect()),
            Value::Object(dict) => dict_to_json(dict),
            Value::Scope(scope) => dict_to_json(&scope.own_entries()),
        }
    }
}

fn dict_to_json(dict: &Dict) -> serde_json::Value {
    serde_json::Value::Object(dict.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Scope(a), Value::Scope(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(values) => f.debug_list().entries(values.iter()).finish(),
            Value::Object(dict) => f.debug_map().entries(dict.iter()).finish(),
            Value::Scope(scope) => f.debug_tuple("Scope").field(&scope.own_entries()).finish(),
            Value::Function(func) => write!(f, "Function({:?})", func.blessing()),
        }
    }
}

/// The canonical string conversion used for content and attribute output.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil | Value::Function(_) => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
            Value::Object(dict) => write_pairs(f, dict),
            Value::Scope(scope) => write_pairs(f, &scope.own_entries()),
        }
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, dict: &Dict) -> fmt::Result {
    for (i, (key, value)) in dict.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(
            f,
            "{}=\"{}\"",
            escape::escape_attribute(key),
            escape::escape_attribute(&value.to_string())
        )?;
    }
    Ok(())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::new(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<SmolStr> for Value {
    fn from(s: SmolStr) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::array(values)
    }
}

impl From<Dict> for Value {
    fn from(dict: Dict) -> Self {
        Value::object(dict)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}

impl From<Scope> for Value {
    fn from(scope: Scope) -> Self {
        Value::Scope(scope)
    }
}
