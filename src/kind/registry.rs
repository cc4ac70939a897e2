//! Built-in kinds and the startup registry.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ConfigError;
use crate::normalize::Pipeline;

use super::descriptor::{DeleteStrategy, ResourceKind};

/// Fields the security plugin attaches to every role and user.
const SECURITY_FLAGS: &[&str] = &["reserved", "hidden", "static"];

/// Returns the API path a built-in kind lives under.
#[must_use]
pub const fn default_api_path(kind: &str) -> Option<&'static str> {
    match kind.as_bytes() {
        b"index" => Some("_settings"),
        b"pipeline" => Some("_ingest/pipeline"),
        b"template" => Some("_template"),
        b"role" => Some("_plugins/_security/api/roles"),
        b"user" => Some("_plugins/_security/api/internalusers"),
        b"license" => Some("_license"),
        b"cluster_settings" => Some("_cluster/settings"),
        _ => None,
    }
}

/// Descriptors for every built-in kind.
#[must_use]
pub fn builtin_kinds() -> Vec<ResourceKind> {
    let path = |kind: &str| default_api_path(kind).unwrap_or_default();
    let collection = |kind: &str| ResourceKind::prefix(kind, path(kind), format!("{}/{{name}}", path(kind)));

    vec![
        ResourceKind::prefix("index", format!("_all/{}", path("index")), format!("{{name}}/{}", path("index")))
            .with_metadata_field("settings")
            .with_pipeline(Pipeline::extracting("settings"))
            .with_create_uri("{name}")
            .with_delete_uri("{name}"),
        collection("pipeline"),
        collection("template"),
        collection("role").with_pipeline(Pipeline::dropping(SECURITY_FLAGS)),
        collection("user")
            .with_pipeline(Pipeline::dropping(SECURITY_FLAGS))
            .excluding("password")
            .redacting("password")
            .redacting("hash"),
        ResourceKind::singleton("license", path("license"))
            .with_query("acknowledge", "true")
            .excluding("*.signature")
            .redacting("*.signature")
            .requiring("license"),
        ResourceKind::singleton("cluster_settings", path("cluster_settings")).with_delete(
            DeleteStrategy::WriteDefault {
                body: serde_json::json!({"persistent": {}, "transient": {}}),
            },
        ),
    ]
}

/// Immutable set of kinds, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, ResourceKind>,
}

impl KindRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Creates a registry holding every built-in kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let kinds = builtin_kinds()
            .into_iter()
            .map(|kind| (kind.name.clone(), kind))
            .collect();
        Self { kinds }
    }

    /// Registers a custom kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is malformed or the name is taken.
    pub fn register(&mut self, kind: ResourceKind) -> Result<(), ConfigError> {
        kind.validate()?;
        if self.kinds.contains_key(&kind.name) {
            return Err(ConfigError::DuplicateKind { kind: kind.name });
        }
        debug!("Registered kind '{}' ({:?})", kind.name, kind.style);
        self.kinds.insert(kind.name.clone(), kind);
        Ok(())
    }

    /// Looks up a kind by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceKind> {
        self.kinds.get(name)
    }

    /// Looks up a kind by name, failing on unknown kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if no kind has this name.
    pub fn resolve(&self, name: &str) -> Result<&ResourceKind, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::UnknownKind {
            kind: name.to_string(),
        })
    }

    /// Iterates over kinds in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceKind> {
        self.kinds.values()
    }

    /// Returns the number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
