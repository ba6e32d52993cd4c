use crate::arena::{Arena, ArenaId};
use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::ops::Index;

pub type LiteralId = ArenaId<Value>;

/// The canonical identity of a literal.
///
/// Externally tagged so that nil, booleans, numbers and strings never serialize to the
/// same key; numbers are keyed by bit pattern so `NaN` and `-0` stay distinct from
/// everything else.
#[derive(Serialize)]
enum Canonical<'a> {
    Nil,
    Bool(bool),
    Number(u64),
    String(&'a str),
    Array(Vec<Canonical<'a>>),
    Object(Vec<(&'a str, Canonical<'a>)>),
    Opaque,
}

impl<'a> From<&'a Value> for Canonical<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Nil => Canonical::Nil,
            Value::Bool(b) => Canonical::Bool(*b),
            Value::Number(n) => Canonical::Number(n.canonical_bits()),
            Value::String(s) => Canonical::String(s.as_str()),
            Value::Array(values) => Canonical::Array(values.iter().map(Canonical::from).collect()),
            Value::Object(dict) => Canonical::Object(
                dict.iter()
                    .map(|(k, v)| (k.as_str(), Canonical::from(v)))
                    .collect(),
            ),
            Value::Scope(_) | Value::Function(_) => Canonical::Opaque,
        }
    }
}

/// Canonical serialization used as the deduplication key.
pub fn canonical_key(value: &Value) -> String {
    serde_json::to_string(&Canonical::from(value)).unwrap_or_default()
}

/// A deduplicating constant pool.
///
/// Registering the same canonical value twice yields the same id; ids are never reused or
/// invalidated.
#[derive(Debug, Clone, Default)]
pub struct LiteralTable {
    values: Arena<Value>,
    ids: FxHashMap<String, LiteralId>,
}

impl LiteralTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut table = Self::new();
        for value in values {
            table.insert(value);
        }
        table
    }

    pub fn insert(&mut self, value: Value) -> LiteralId {
        let key = canonical_key(&value);
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }

        let id = self.values.alloc(value);
        self.ids.insert(key, id);
        id
    }

    pub fn get(&self, id: LiteralId) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LiteralId, &Value)> {
        self.values.iter()
    }
}

impl Index<LiteralId> for LiteralTable {
    type Output = Value;

    fn index(&self, id: LiteralId) -> &Self::Output {
        &self.values[id]
    }
}
