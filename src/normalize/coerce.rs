//! Deep leaf coercions.

use serde_json::{Number, Value};

/// Converts every scalar leaf into its string form.
///
/// Nulls are kept as nulls so that an explicit `null` in declared content
/// still means "unset" after coercion.
#[must_use]
pub fn deep_to_string(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, deep_to_string(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(deep_to_string).collect()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other @ (Value::String(_) | Value::Null) => other,
    }
}

/// Converts string leaves that look like integers back into numbers.
///
/// Anything else (floats, identifiers, integers outside `i64`) stays a string.
#[must_use]
pub fn deep_to_int(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, deep_to_int(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(deep_to_int).collect()),
        Value::String(s) => match parse_integer(&s) {
            Some(n) => Value::Number(Number::from(n)),
            None => Value::String(s),
        },
        other => other,
    }
}

/// String pass followed by integer pass.
#[must_use]
pub fn coerce(value: Value) -> Value {
    deep_to_int(deep_to_string(value))
}

fn parse_integer(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_and_numeric_strings_converge() {
        let from_number = coerce(json!({"index": {"number_of_shards": 5}}));
        let from_string = coerce(json!({"index": {"number_of_shards": "5"}}));
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, json!({"index": {"number_of_shards": 5}}));
    }

    #[test]
    fn test_non_integer_strings_are_preserved() {
        let value = coerce(json!({
            "uuid": "vtJrcgyeRviqllRakSlrSw",
            "ratio": 1.5,
            "enabled": true,
            "huge": "123456789012345678901234567890",
            "negative": "-3",
            "dash": "-",
        }));
        assert_eq!(
            value,
            json!({
                "uuid": "vtJrcgyeRviqllRakSlrSw",
                "ratio": "1.5",
                "enabled": "true",
                "huge": "123456789012345678901234567890",
                "negative": -3,
                "dash": "-",
            })
        );
    }

    #[test]
    fn test_arrays_are_coerced_elementwise() {
        let value = coerce(json!({"ports": [1, "2", "x"]}));
        assert_eq!(value, json!({"ports": [1, 2, "x"]}));
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let raw = json!({
            "settings": {"creation_date": "1487354196301", "shards": 1, "nested": [true, null, "007"]},
            "name": "a",
        });
        let once = coerce(raw);
        assert_eq!(coerce(once.clone()), once);
    }
}
