//! Operator semantics shared by rendering and constant folding.

use super::matching::is_matching_object;
use crate::number::{NAN, Number};
use crate::value::{Dict, Name, Value};
use std::{cmp::Ordering, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Nq,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    Ni,
    Like,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "eq" => BinaryOp::Eq,
            "nq" => BinaryOp::Nq,
            "lt" => BinaryOp::Lt,
            "gt" => BinaryOp::Gt,
            "le" => BinaryOp::Le,
            "ge" => BinaryOp::Ge,
            "in" => BinaryOp::In,
            "ni" => BinaryOp::Ni,
            "lk" => BinaryOp::Like,
            "ad" => BinaryOp::Add,
            "su" => BinaryOp::Sub,
            "mu" => BinaryOp::Mul,
            "dv" => BinaryOp::Div,
            "md" => BinaryOp::Rem,
            _ => return None,
        })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "eq",
            BinaryOp::Nq => "nq",
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::Le => "le",
            BinaryOp::Ge => "ge",
            BinaryOp::In => "in",
            BinaryOp::Ni => "ni",
            BinaryOp::Like => "lk",
            BinaryOp::Add => "ad",
            BinaryOp::Sub => "su",
            BinaryOp::Mul => "mu",
            BinaryOp::Div => "dv",
            BinaryOp::Rem => "md",
        }
    }

    /// The operator computing the logical negation, for relational operators.
    pub fn inverse(&self) -> Option<Self> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Nq),
            BinaryOp::Nq => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Le => Some(BinaryOp::Gt),
            BinaryOp::In => Some(BinaryOp::Ni),
            BinaryOp::Ni => Some(BinaryOp::In),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "no" => Some(UnaryOp::Not),
            "ng" => Some(UnaryOp::Neg),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            UnaryOp::Not => "no",
            UnaryOp::Neg => "ng",
        }
    }
}

pub fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Eq => eq(l, r),
        BinaryOp::Nq => nq(l, r),
        BinaryOp::Lt => lt(l, r),
        BinaryOp::Gt => gt(l, r),
        BinaryOp::Le => le(l, r),
        BinaryOp::Ge => ge(l, r),
        BinaryOp::In => contains(l, r),
        BinaryOp::Ni => not_contains(l, r),
        BinaryOp::Like => like(l, r),
        BinaryOp::Add => add(l, r),
        BinaryOp::Sub => sub(l, r),
        BinaryOp::Mul => mul(l, r),
        BinaryOp::Div => div(l, r),
        BinaryOp::Rem => rem(l, r),
    }
}

pub fn unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => not(value),
        UnaryOp::Neg => neg(value),
    }
}

/// Numeric coercion: nil and non-numeric strings are `NaN`, booleans are 0 or 1.
pub fn to_number(value: &Value) -> Number {
    match value {
        Value::Number(n) => *n,
        Value::Bool(b) => Number::from(*b as i64),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Number::from(0)
            } else {
                trimmed.parse::<f64>().map(Number::new).unwrap_or(NAN)
            }
        }
        _ => NAN,
    }
}

#[inline(always)]
pub fn truthy(value: &Value) -> bool {
    value.is_truthy()
}

pub fn eq(l: &Value, r: &Value) -> Value {
    Value::Bool(l == r)
}

pub fn nq(l: &Value, r: &Value) -> Value {
    Value::Bool(l != r)
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => to_number(l).compare(&to_number(r)),
    }
}

pub fn lt(l: &Value, r: &Value) -> Value {
    Value::Bool(compare(l, r) == Some(Ordering::Less))
}

pub fn gt(l: &Value, r: &Value) -> Value {
    Value::Bool(compare(l, r) == Some(Ordering::Greater))
}

pub fn le(l: &Value, r: &Value) -> Value {
    Value::Bool(matches!(compare(l, r), Some(Ordering::Less | Ordering::Equal)))
}

pub fn ge(l: &Value, r: &Value) -> Value {
    Value::Bool(matches!(compare(l, r), Some(Ordering::Greater | Ordering::Equal)))
}

/// Membership of `l` in `r`: array element, object or scope key, or substring.
pub fn contains(l: &Value, r: &Value) -> Value {
    Value::Bool(match r {
        Value::Array(values) => values.contains(l),
        Value::Object(dict) => dict.contains_key(l.to_string().as_str()),
        Value::Scope(scope) => scope.lookup(&l.to_string()).is_some(),
        Value::String(s) => s.contains(l.to_string().as_str()),
        _ => false,
    })
}

pub fn not_contains(l: &Value, r: &Value) -> Value {
    not(&contains(l, r))
}

/// `value like template`.
pub fn like(l: &Value, r: &Value) -> Value {
    Value::Bool(is_matching_object(r, l))
}

/// Addition, or concatenation when either operand is a string.
pub fn add(l: &Value, r: &Value) -> Value {
    match (l, r) {
        (Value::String(_), _) | (_, Value::String(_)) => Value::from(format!("{l}{r}")),
        _ => Value::Number(to_number(l) + to_number(r)),
    }
}

pub fn sub(l: &Value, r: &Value) -> Value {
    Value::Number(to_number(l) - to_number(r))
}

pub fn mul(l: &Value, r: &Value) -> Value {
    Value::Number(to_number(l) * to_number(r))
}

pub fn div(l: &Value, r: &Value) -> Value {
    Value::Number(to_number(l) / to_number(r))
}

pub fn rem(l: &Value, r: &Value) -> Value {
    Value::Number(to_number(l) % to_number(r))
}

pub fn not(value: &Value) -> Value {
    Value::Bool(!value.is_truthy())
}

pub fn neg(value: &Value) -> Value {
    Value::Number(-to_number(value))
}

/// Null-propagating property access. Numeric properties index arrays and strings.
pub fn member(object: &Value, property: &Value) -> Value {
    match (object, property) {
        (Value::Nil, _) => Value::Nil,
        (Value::Array(values), Value::Number(n)) => index(n)
            .and_then(|i| values.get(i).cloned())
            .unwrap_or_default(),
        (Value::Array(values), Value::String(s)) if s == "length" => Value::from(values.len()),
        (Value::String(s), Value::Number(n)) => index(n)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::from(c.to_string()))
            .unwrap_or_default(),
        (Value::String(s), Value::String(p)) if p == "length" => Value::from(s.chars().count()),
        (object, property) => object.property(&property.to_string()),
    }
}

fn index(n: &Number) -> Option<usize> {
    (n.is_int() && n.value() >= 0.0).then(|| n.value() as usize)
}

/// Builds an object from evaluated key/value pairs; keys are stringified.
pub fn dict(entries: Vec<(Value, Value)>) -> Value {
    Value::object(
        entries
            .into_iter()
            .map(|(k, v)| (Name::from(k.to_string()), v))
            .collect::<Dict>(),
    )
}

/// The `(key, value)` pairs a `for` range visits.
///
/// Arrays yield indices, objects and scopes their keys, nil nothing, and any other value
/// iterates once with key `0`.
pub fn iterate(collection: &Value) -> Vec<(Value, Value)> {
    match collection {
        Value::Nil => Vec::new(),
        Value::Array(values) => values
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v.clone()))
            .collect(),
        Value::Object(dict) => dict
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect(),
        Value::Scope(scope) => scope
            .own_entries()
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect(),
        value => vec![(Value::from(0.0), value.clone())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    #[rstest]
    #[case(BinaryOp::Add, json!(1), json!(2), json!(3))]
    #[case(BinaryOp::Add, json!("a"), json!(1), json!("a1"))]
    #[case(BinaryOp::Add, json!(1), json!("a"), json!("1a"))]
    #[case(BinaryOp::Sub, json!(10), json!("4"), json!(6))]
    #[case(BinaryOp::Mul, json!(10), json!(99), json!(990))]
    #[case(BinaryOp::Div, json!(7), json!(2), json!(3.5))]
    #[case(BinaryOp::Rem, json!(7), json!(2), json!(1))]
    #[case(BinaryOp::Gt, json!(990), json!(900), json!(true))]
    #[case(BinaryOp::Lt, json!("a"), json!("b"), json!(true))]
    #[case(BinaryOp::Le, json!(2), json!(2), json!(true))]
    #[case(BinaryOp::Ge, json!(1), json!(2), json!(false))]
    #[case(BinaryOp::Eq, json!([1, 2]), json!([1, 2]), json!(true))]
    #[case(BinaryOp::Nq, json!("a"), json!("a"), json!(false))]
    #[case(BinaryOp::In, json!(2), json!([1, 2]), json!(true))]
    #[case(BinaryOp::In, json!("b"), json!({"b": 1}), json!(true))]
    #[case(BinaryOp::In, json!("ell"), json!("hello"), json!(true))]
    #[case(BinaryOp::Ni, json!(3), json!([1, 2]), json!(true))]
    #[case(BinaryOp::Like, json!({"a": 1, "b": 2}), json!({"a": 1}), json!(true))]
    fn test_binary(
        #[case] op: BinaryOp,
        #[case] l: serde_json::Value,
        #[case] r: serde_json::Value,
        #[case] expected: serde_json::Value,
    ) {
        assert_eq!(binary(op, &v(l), &v(r)), v(expected));
    }

    #[rstest]
    #[case(json!(null), json!("a"), json!(null))]
    #[case(json!({"a": {"b": 1}}), json!("a"), json!({"b": 1}))]
    #[case(json!(["x", "y"]), json!(1), json!("y"))]
    #[case(json!(["x", "y"]), json!(5), json!(null))]
    #[case(json!(["x", "y"]), json!("length"), json!(2))]
    #[case(json!(3), json!("a"), json!(null))]
    fn test_member(#[case] object: serde_json::Value, #[case] property: serde_json::Value, #[case] expected: serde_json::Value) {
        assert_eq!(member(&v(object), &v(property)), v(expected));
    }

    #[rstest]
    #[case(json!(null), 0)]
    #[case(json!([1, 2, 3]), 3)]
    #[case(json!({"a": 1, "b": 2}), 2)]
    #[case(json!("scalar"), 1)]
    fn test_iterate(#[case] collection: serde_json::Value, #[case] expected: usize) {
        assert_eq!(iterate(&v(collection)).len(), expected);
    }

    #[test]
    fn test_inverse_is_involution() {
        for op in [BinaryOp::Eq, BinaryOp::Lt, BinaryOp::Gt, BinaryOp::In] {
            assert_eq!(op.inverse().and_then(|i| i.inverse()), Some(op));
        }
        assert_eq!(BinaryOp::Add.inverse(), None);
    }
}
