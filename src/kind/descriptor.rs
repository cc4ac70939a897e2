//! The data-driven description of one resource kind.
//!
//! Everything that differs between indices, pipelines, licenses and the rest
//! lives here as plain data: a descriptor is built once at startup and passed
//! by reference to discovery, the comparator and the executor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::normalize::Pipeline;
use crate::transport::Method;

/// Placeholder substituted with the object name in URI templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// How objects of a kind are addressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// Name-keyed collection read, per-name write URI.
    Prefix,
    /// One shared collection endpoint, no per-name URI.
    Bare,
}

/// Shape of the document behind a bare-style endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BareLayout {
    /// The whole document is one object's content.
    #[default]
    Singleton,
    /// The document maps names to objects and is rewritten as a whole.
    Keyed,
}

/// Verb used for full-body writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMethod {
    /// `PUT`.
    #[default]
    Put,
    /// `POST`.
    Post,
}

/// What "delete" means for a kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Issue an HTTP DELETE.
    #[default]
    Verb,
    /// The endpoint has no delete verb; write this body instead.
    WriteDefault {
        /// Body written in place of a delete.
        body: Value,
    },
}

/// A dotted path into content; `*` matches any key at that level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

/// Descriptor for one kind of administrative object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceKind {
    /// Kind name used in declarations (`index`, `license`, ...).
    pub name: String,
    /// Name of the managed property, used in display output.
    #[serde(default = "default_metadata_field")]
    pub metadata_field: String,
    /// Addressing style.
    pub style: AddressingStyle,
    /// Document layout for bare kinds.
    #[serde(default)]
    pub layout: BareLayout,
    /// Collection read, issued once per pass.
    pub discovery_uri: String,
    /// Per-object URI template (prefix) or fixed write URI (bare).
    pub object_uri: String,
    /// Alternate URI used when the object does not exist yet.
    #[serde(default)]
    pub create_uri: Option<String>,
    /// Envelope key wrapping the body of a create through `create_uri`.
    #[serde(default)]
    pub create_envelope: Option<String>,
    /// Alternate URI for deletes.
    #[serde(default)]
    pub delete_uri: Option<String>,
    /// Verb for full-body writes.
    #[serde(default)]
    pub write_method: WriteMethod,
    /// Query-string extras sent with every write.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Envelope key wrapping declared content on writes.
    #[serde(default)]
    pub body_envelope: Option<String>,
    /// Normalization applied to discovered payloads.
    #[serde(default = "Pipeline::coercing")]
    pub pipeline: Pipeline,
    /// Declared sub-fields ignored by the comparator.
    #[serde(default)]
    pub compare_exclusions: Vec<FieldPath>,
    /// Sub-fields replaced by a placeholder in display output.
    #[serde(default)]
    pub redacted_fields: Vec<FieldPath>,
    /// Delete semantics.
    #[serde(default)]
    pub delete: DeleteStrategy,
    /// Keyed bare kinds only: flush all changes as one write per pass.
    #[serde(default)]
    pub batched: bool,
    /// Name under which a bare singleton is reported by discovery.
    #[serde(default)]
    pub default_name: Option<String>,
    /// Top-level keys declared content must carry.
    #[serde(default)]
    pub required_keys: Vec<String>,
}

fn default_metadata_field() -> String {
    String::from("content")
}

impl FieldPath {
    /// Parses a dotted path.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(String::from).collect())
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.0.join(".")
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<WriteMethod> for Method {
    fn from(method: WriteMethod) -> Self {
        match method {
            WriteMethod::Put => Self::Put,
            WriteMethod::Post => Self::Post,
        }
    }
}

impl ResourceKind {
    /// Creates a prefix-style kind with coercing normalization.
    #[must_use]
    pub fn prefix(
        name: impl Into<String>,
        discovery_uri: impl Into<String>,
        object_uri: impl Into<String>,
    ) -> Self {
        Self::base(name.into(), AddressingStyle::Prefix, discovery_uri.into(), object_uri.into())
    }

    /// Creates a bare singleton kind whose write URI equals its read URI.
    #[must_use]
    pub fn singleton(name: impl Into<String>, uri: impl Into<String>) -> Self {
        let name = name.into();
        let uri = uri.into();
        let mut kind = Self::base(name.clone(), AddressingStyle::Bare, uri.clone(), uri);
        kind.default_name = Some(name);
        kind
    }

    /// Creates a bare keyed kind whose write URI equals its read URI.
    #[must_use]
    pub fn keyed(name: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let mut kind = Self::base(name.into(), AddressingStyle::Bare, uri.clone(), uri);
        kind.layout = BareLayout::Keyed;
        kind
    }

    fn base(name: String, style: AddressingStyle, discovery_uri: String, object_uri: String) -> Self {
        Self {
            name,
            metadata_field: default_metadata_field(),
            style,
            layout: BareLayout::default(),
            discovery_uri,
            object_uri,
            create_uri: None,
            create_envelope: None,
            delete_uri: None,
            write_method: WriteMethod::default(),
            query: BTreeMap::new(),
            body_envelope: None,
            pipeline: Pipeline::coercing(),
            compare_exclusions: Vec::new(),
            redacted_fields: Vec::new(),
            delete: DeleteStrategy::default(),
            batched: false,
            default_name: None,
            required_keys: Vec::new(),
        }
    }

    /// Sets the managed property name.
    #[must_use]
    pub fn with_metadata_field(mut self, field: impl Into<String>) -> Self {
        self.metadata_field = field.into();
        self
    }

    /// Sets the normalization pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Adds a query-string extra sent with every write.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Sets the URI used to create an object that does not exist yet.
    #[must_use]
    pub fn with_create_uri(mut self, uri: impl Into<String>) -> Self {
        self.create_uri = Some(uri.into());
        self
    }

    /// Sets the delete URI.
    #[must_use]
    pub fn with_delete_uri(mut self, uri: impl Into<String>) -> Self {
        self.delete_uri = Some(uri.into());
        self
    }

    /// Sets the delete strategy.
    #[must_use]
    pub fn with_delete(mut self, delete: DeleteStrategy) -> Self {
        self.delete = delete;
        self
    }

    /// Excludes a declared sub-field from comparison.
    #[must_use]
    pub fn excluding(mut self, path: &str) -> Self {
        self.compare_exclusions.push(FieldPath::parse(path));
        self
    }

    /// Redacts a sub-field in display output.
    #[must_use]
    pub fn redacting(mut self, path: &str) -> Self {
        self.redacted_fields.push(FieldPath::parse(path));
        self
    }

    /// Requires a top-level key in declared content.
    #[must_use]
    pub fn requiring(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    /// Enables end-of-pass batching.
    #[must_use]
    pub const fn batched(mut self) -> Self {
        self.batched = true;
        self
    }

    /// Returns true for bare-style kinds.
    #[must_use]
    pub const fn is_bare(&self) -> bool {
        matches!(self.style, AddressingStyle::Bare)
    }

    /// Returns true for bare kinds whose document is keyed by name.
    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        self.is_bare() && matches!(self.layout, BareLayout::Keyed)
    }

    /// Returns true for bare kinds whose document is a single object.
    #[must_use]
    pub const fn is_singleton(&self) -> bool {
        self.is_bare() && matches!(self.layout, BareLayout::Singleton)
    }

    /// Checks the descriptor for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| Err(ConfigError::malformed(&self.name, message));

        if self.name.trim().is_empty() {
            return fail("kind name cannot be empty");
        }
        if self.discovery_uri.trim().is_empty() {
            return fail("discovery_uri cannot be empty");
        }
        if self.style == AddressingStyle::Prefix && !self.object_uri.contains(NAME_PLACEHOLDER) {
            return fail("prefix kinds need {name} in object_uri");
        }
        if self.is_bare() && self.object_uri.contains(NAME_PLACEHOLDER) {
            return fail("bare kinds have no per-name URI; drop {name} from object_uri");
        }
        if self.batched && !self.is_keyed() {
            return fail("batched writes need a bare keyed kind");
        }
        if self.is_keyed() && matches!(self.delete, DeleteStrategy::WriteDefault { .. }) {
            return fail("keyed kinds delete by rewriting the document; write_default does not apply");
        }
        if self.is_singleton() && self.default_name.is_none() {
            return fail("bare singleton kinds need a default_name");
        }
        if self.create_envelope.is_some() && self.create_uri.is_none() {
            return fail("create_envelope needs create_uri");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_shapes_validate() {
        assert!(ResourceKind::prefix("pipeline", "_ingest/pipeline", "_ingest/pipeline/{name}")
            .validate()
            .is_ok());
        assert!(ResourceKind::singleton("license", "_license").validate().is_ok());
        assert!(ResourceKind::keyed("mappings", "_mappings").batched().validate().is_ok());
    }

    #[test]
    fn test_prefix_without_placeholder_is_malformed() {
        let err = ResourceKind::prefix("pipeline", "_ingest/pipeline", "_ingest/pipeline")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedDescriptor { .. }));
    }

    #[test]
    fn test_batched_singleton_is_malformed() {
        assert!(ResourceKind::singleton("license", "_license").batched().validate().is_err());
    }

    #[test]
    fn test_keyed_with_write_default_is_malformed() {
        let kind = ResourceKind::keyed("store", "_store").with_delete(DeleteStrategy::WriteDefault {
            body: serde_json::json!({}),
        });
        assert!(kind.validate().is_err());
    }

    #[test]
    fn test_field_path_round_trip() {
        let path = FieldPath::parse("*.signature");
        assert_eq!(path.segments(), ["*", "signature"]);
        assert_eq!(String::from(path), "*.signature");
    }

    #[test]
    fn test_descriptor_from_yaml() {
        let yaml = r"
name: secure_settings
style: bare
layout: keyed
discovery_uri: _secure/settings
object_uri: _secure/settings
batched: true
redacted_fields: ['*.value']
pipeline:
  - stage: deep_to_string
";
        let kind: ResourceKind = serde_yaml::from_str(yaml).unwrap();
        assert!(kind.is_keyed());
        assert!(kind.batched);
        assert_eq!(kind.metadata_field, "content");
        assert_eq!(kind.redacted_fields, vec![FieldPath::parse("*.value")]);
        assert!(kind.validate().is_ok());
    }
}
