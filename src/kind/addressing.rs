//! URI resolution for prefix-style and bare-style kinds.

use serde_json::Value;

use crate::record::Content;
use crate::transport::{ApiRequest, Method};

use super::descriptor::{DeleteStrategy, NAME_PLACEHOLDER, ResourceKind};

/// The single collection read issued for a kind each pass.
#[must_use]
pub fn discovery_request(kind: &ResourceKind) -> ApiRequest {
    ApiRequest::get(trim(&kind.discovery_uri))
}

/// Resolves the write URI for one object.
///
/// Bare kinds have no per-name URI, so the name is ignored.
#[must_use]
pub fn object_path(kind: &ResourceKind, name: &str) -> String {
    expand(&kind.object_uri, name)
}

/// Builds the full-body write for a declared object.
///
/// `exists` selects the discrete creation URI when the kind has one.
#[must_use]
pub fn write_request(kind: &ResourceKind, name: &str, declared: &Content, exists: bool) -> ApiRequest {
    let method = Method::from(kind.write_method);

    if !exists && let Some(create_uri) = &kind.create_uri {
        let body = wrap(kind.create_envelope.as_deref(), declared);
        return ApiRequest::new(method, expand(create_uri, name))
            .with_body(body)
            .with_query(&kind.query);
    }

    ApiRequest::new(method, object_path(kind, name))
        .with_body(wrap(kind.body_envelope.as_deref(), declared))
        .with_query(&kind.query)
}

/// Builds the removal request for one object.
///
/// Kinds without a delete verb get a write of their default body instead.
#[must_use]
pub fn delete_request(kind: &ResourceKind, name: &str) -> ApiRequest {
    match &kind.delete {
        DeleteStrategy::Verb => {
            let path = kind
                .delete_uri
                .as_deref()
                .map_or_else(|| object_path(kind, name), |uri| expand(uri, name));
            ApiRequest::new(Method::Delete, path)
        }
        DeleteStrategy::WriteDefault { body } => {
            ApiRequest::new(Method::from(kind.write_method), object_path(kind, name))
                .with_body(body.clone())
                .with_query(&kind.query)
        }
    }
}

/// Builds the whole-document write for a keyed bare kind.
#[must_use]
pub fn document_request(kind: &ResourceKind, document: &Content) -> ApiRequest {
    ApiRequest::new(Method::from(kind.write_method), trim(&kind.object_uri))
        .with_body(Value::Object(document.clone()))
        .with_query(&kind.query)
}

/// Wraps declared content in the kind's body envelope.
#[must_use]
pub fn wrap(envelope: Option<&str>, declared: &Content) -> Value {
    let body = Value::Object(declared.clone());
    match envelope {
        Some(key) => {
            let mut outer = Content::new();
            outer.insert(key.to_string(), body);
            Value::Object(outer)
        }
        None => body,
    }
}

fn expand(template: &str, name: &str) -> String {
    trim(&template.replace(NAME_PLACEHOLDER, name))
}

fn trim(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> Content {
        match value {
            Value::Object(map) => map,
            _ => Content::new(),
        }
    }

    #[test]
    fn test_prefix_write_targets_per_object_uri() {
        let kind = ResourceKind::prefix("index", "_all/_settings", "{name}/_settings");
        let declared = content(json!({"index": {"number_of_shards": 1}}));

        let request = write_request(&kind, "idx1", &declared, false);
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "idx1/_settings");
        assert!(request.query.is_empty());
        assert_eq!(request.body, Some(json!({"index": {"number_of_shards": 1}})));
    }

    #[test]
    fn test_discrete_creation_only_when_absent() {
        let mut kind = ResourceKind::prefix("index", "_all/_settings", "{name}/_settings");
        kind.create_uri = Some(String::from("{name}"));
        kind.create_envelope = Some(String::from("settings"));
        let declared = content(json!({"index": {"number_of_replicas": 0}}));

        let create = write_request(&kind, "idx1", &declared, false);
        assert_eq!(create.path, "idx1");
        assert_eq!(create.body, Some(json!({"settings": {"index": {"number_of_replicas": 0}}})));

        let update = write_request(&kind, "idx1", &declared, true);
        assert_eq!(update.path, "idx1/_settings");
    }

    #[test]
    fn test_bare_write_carries_query_extras() {
        let kind = ResourceKind::singleton("license", "_license").with_query("acknowledge", "true");
        let declared = content(json!({"license": {"uid": "u"}}));

        let request = write_request(&kind, "anything", &declared, true);
        assert_eq!(request.path, "_license");
        assert_eq!(
            request.query,
            vec![(String::from("acknowledge"), String::from("true"))]
        );
        assert_eq!(request.to_string(), "PUT /_license?acknowledge=true");
    }

    #[test]
    fn test_delete_uses_override_or_default_body() {
        let index = ResourceKind::prefix("index", "_all/_settings", "{name}/_settings")
            .with_delete_uri("{name}");
        let request = delete_request(&index, "idx1");
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "idx1");

        let settings = ResourceKind::singleton("cluster_settings", "_cluster/settings").with_delete(
            DeleteStrategy::WriteDefault {
                body: json!({"persistent": {}}),
            },
        );
        let request = delete_request(&settings, "cluster_settings");
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "_cluster/settings");
        assert_eq!(request.body, Some(json!({"persistent": {}})));
    }

    #[test]
    fn test_body_envelope() {
        assert_eq!(
            wrap(Some("content"), &content(json!({"a": 1}))),
            json!({"content": {"a": 1}})
        );
    }
}
