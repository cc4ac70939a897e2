//! Transition decisions.
//!
//! Given a declared object and what discovery saw, decide which of the four
//! transitions applies. Only `Create`, `Update` and `Delete` touch the network.

use serde::Serialize;
use tracing::debug;

use crate::error::ValidationError;
use crate::kind::ResourceKind;
use crate::record::{CurrentRecord, DesiredRecord, Ensure};

use super::compare::kind_in_sync;

/// Types of actions taken for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// absent → present: full-body write of a new object.
    Create,
    /// present → present, out of sync: full-body rewrite.
    Update,
    /// present → absent.
    Delete,
    /// Already converged; no network call.
    #[serde(rename = "none")]
    Noop,
}

/// Decides the transition for one declared object.
#[must_use]
pub fn decide(kind: &ResourceKind, desired: &DesiredRecord, current: Option<&CurrentRecord>) -> ActionType {
    let action = match (desired.ensure, current) {
        (Ensure::Present, None) => ActionType::Create,
        (Ensure::Present, Some(current)) => {
            if kind_in_sync(kind, &desired.content, &current.content) {
                ActionType::Noop
            } else {
                ActionType::Update
            }
        }
        (Ensure::Absent, Some(_)) => ActionType::Delete,
        (Ensure::Absent, None) => ActionType::Noop,
    };

    debug!("{} '{}': {action}", kind.name, desired.name);
    action
}

/// Checks structural preconditions on a declared object.
///
/// Runs before any network call; a rejected object is never written.
///
/// # Errors
///
/// Returns an error naming the first violated precondition.
pub fn validate_declared(kind: &ResourceKind, desired: &DesiredRecord) -> Result<(), ValidationError> {
    let reject = |message: String| Err(ValidationError::new(&kind.name, &desired.name, message));

    let name = desired.name.as_str();
    if name.trim().is_empty() {
        return reject(String::from("name cannot be empty"));
    }
    if name.contains('/') || name.chars().any(char::is_whitespace) {
        return reject(format!("name '{name}' cannot contain '/' or whitespace"));
    }
    if matches!(name, "." | "..") {
        return reject(format!("name '{name}' is reserved"));
    }

    if desired.ensure == Ensure::Present {
        for key in &kind.required_keys {
            match desired.content.get(key) {
                Some(serde_json::Value::Object(_)) => {}
                Some(_) => return reject(format!("'{key}' must be a mapping")),
                None => return reject(format!("'{key}' is required")),
            }
        }
    }

    Ok(())
}

impl ActionType {
    /// Returns true when the action issues a write.
    #[must_use]
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::Noop)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Noop => "none",
        };
        write!(f, "{s}")
    }
}
