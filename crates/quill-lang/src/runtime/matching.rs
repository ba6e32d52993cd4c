use crate::value::Value;

/// Structural `like` matching of `value` against `template`.
///
/// Nil matches only nil, scalars need equality, arrays need equal length and a pointwise
/// match, and objects need every template key to match the same key of the value. Extra
/// keys on the value are ignored.
pub fn is_matching_object(template: &Value, value: &Value) -> bool {
    match template {
        Value::Nil => value.is_nil(),
        Value::Array(items) => match value {
            Value::Array(values) => {
                items.len() == values.len()
                    && items
                        .iter()
                        .zip(values.iter())
                        .all(|(t, v)| is_matching_object(t, v))
            }
            _ => false,
        },
        Value::Object(entries) => match value {
            Value::Object(_) | Value::Scope(_) => entries
                .iter()
                .all(|(key, t)| is_matching_object(t, &value.property(key))),
            _ => false,
        },
        Value::Scope(scope) => is_matching_object(&Value::object(scope.own_entries()), value),
        template => template == value,
    }
}
