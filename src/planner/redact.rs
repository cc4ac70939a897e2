//! Display redaction.
//!
//! Kept apart from comparison exclusions on purpose: a field can be hidden
//! from logs yet still compared (a user's `hash`), or compared with
//! exclusions that differ from what is hidden.

use serde_json::Value;

use crate::kind::{FieldPath, ResourceKind};
use crate::record::Content;

/// Placeholder shown instead of a redacted value.
pub const REDACTED: &str = "[redacted]";

/// Returns a copy of `content` with every matching field replaced.
#[must_use]
pub fn redact(content: &Content, fields: &[FieldPath]) -> Content {
    let mut redacted = content.clone();
    for path in fields {
        replace_path(&mut redacted, path.segments());
    }
    redacted
}

/// Renders content for logs and audit output, redacted per `kind`.
#[must_use]
pub fn display(kind: &ResourceKind, content: &Content) -> String {
    Value::Object(redact(content, &kind.redacted_fields)).to_string()
}

fn replace_path(map: &mut Content, segments: &[String]) {
    match segments {
        [] => {}
        [last] if last == "*" => {
            for value in map.values_mut() {
                *value = Value::String(REDACTED.to_string());
            }
        }
        [last] => {
            if let Some(value) = map.get_mut(last) {
                *value = Value::String(REDACTED.to_string());
            }
        }
        [head, rest @ ..] if head == "*" => {
            for value in map.values_mut() {
                if let Value::Object(inner) = value {
                    replace_path(inner, rest);
                }
            }
        }
        [head, rest @ ..] => {
            if let Some(Value::Object(inner)) = map.get_mut(head) {
                replace_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::kind_in_sync;
    use serde_json::json;

    fn content(value: Value) -> Content {
        match value {
            Value::Object(map) => map,
            _ => Content::new(),
        }
    }

    #[test]
    fn test_license_signature_is_redacted() {
        let kind = ResourceKind::singleton("license", "_license").redacting("*.signature");
        let declared = content(json!({"license": {"uid": "u-1", "signature": "abc"}}));

        let shown = display(&kind, &declared);
        assert!(shown.contains(REDACTED));
        assert!(!shown.contains("abc"));
        assert!(shown.contains("u-1"));

        // Redaction never touches the original.
        assert_eq!(declared["license"]["signature"], json!("abc"));
    }

    #[test]
    fn test_missing_fields_are_not_invented() {
        let redacted = redact(&content(json!({"backend_roles": []})), &[FieldPath::parse("password")]);
        assert_eq!(Value::Object(redacted), json!({"backend_roles": []}));
    }

    #[test]
    fn test_redaction_and_exclusion_are_independent() {
        // `hash` is hidden from display but still compared.
        let kind = ResourceKind::prefix("user", "_users", "_users/{name}")
            .excluding("password")
            .redacting("password")
            .redacting("hash");
        let declared = content(json!({"hash": "$2y$12$abc", "password": "secret"}));
        let observed = content(json!({"hash": "$2y$12$other"}));

        assert!(!kind_in_sync(&kind, &declared, &observed));
        let shown = display(&kind, &declared);
        assert!(!shown.contains("secret"));
        assert!(!shown.contains("$2y$12$abc"));
    }
}
