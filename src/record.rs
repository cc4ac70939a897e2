//! Desired and current records exchanged between the declaration layer,
//! discovery and the reconciler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested string-keyed mapping holding an object's content.
pub type Content = Map<String, Value>;

/// Whether an object should exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// The object must exist with the declared content.
    #[default]
    Present,
    /// The object must not exist.
    Absent,
}

/// One declared object, supplied fresh for every pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesiredRecord {
    /// Kind the object belongs to (e.g. `index`, `license`).
    pub kind: String,
    /// Unique name within the kind.
    pub name: String,
    /// Desired existence.
    #[serde(default)]
    pub ensure: Ensure,
    /// Declared content. Empty means "manage existence only".
    #[serde(default)]
    pub content: Content,
}

/// An object as read back from the cluster during one pass.
///
/// Never cached across passes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentRecord {
    /// Kind the object belongs to.
    pub kind: String,
    /// Name under which the cluster reports the object.
    pub name: String,
    /// Always [`Ensure::Present`] for discovered objects.
    pub ensure: Ensure,
    /// Content after the kind's normalization pipeline.
    pub content: Content,
}

impl DesiredRecord {
    /// Creates a record that should be present with the given content.
    #[must_use]
    pub fn present(kind: impl Into<String>, name: impl Into<String>, content: Content) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            ensure: Ensure::Present,
            content,
        }
    }

    /// Creates a record that should be absent.
    #[must_use]
    pub fn absent(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            ensure: Ensure::Absent,
            content: Content::new(),
        }
    }
}

impl CurrentRecord {
    /// Creates a discovered record.
    #[must_use]
    pub fn discovered(kind: impl Into<String>, name: impl Into<String>, content: Content) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            ensure: Ensure::Present,
            content,
        }
    }
}

impl std::fmt::Display for Ensure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}
