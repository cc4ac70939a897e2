//! Error types for the searchsync reconciliation system.
//!
//! Startup problems (configuration, kind descriptors) are fatal and surface
//! as [`ConfigError`]. Everything that can go wrong while reconciling a
//! single object is scoped to that object and reported in the pass report
//! via [`FailureKind`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the searchsync system.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors (fatal at startup).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection, TLS or timeout failures talking to the cluster.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Unparseable payload returned by the cluster.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Declared content failed a structural precondition.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Mutation rejected by the cluster.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A declared resource references a kind nobody registered.
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// The unknown kind name.
        kind: String,
    },

    /// Two descriptors were registered under the same kind name.
    #[error("Duplicate resource kind: {kind}")]
    DuplicateKind {
        /// The duplicated kind name.
        kind: String,
    },

    /// The same object was declared twice.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind of the duplicated object.
        kind: String,
        /// The duplicated name.
        name: String,
    },

    /// A kind descriptor is internally inconsistent.
    #[error("Malformed descriptor for kind '{kind}': {message}")]
    MalformedDescriptor {
        /// Kind whose descriptor is malformed.
        kind: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client could not be built (bad CA file, bad proxy URL).
    #[error("Failed to build HTTP client: {message}")]
    Client {
        /// Description of the failure.
        message: String,
    },

    /// Connection or TLS failure.
    #[error("Network error communicating with the cluster: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {message}")]
    Timeout {
        /// Description of the timed out request.
        message: String,
    },

    /// A read returned a status other than 2xx or 404.
    #[error("Unexpected status {status} reading {path}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Path that was read.
        path: String,
        /// Response body.
        body: String,
    },
}

/// A payload returned by the cluster could not be parsed or normalized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}{message}", entry_prefix(.entry.as_deref()))]
pub struct ParseError {
    /// Description of the problem.
    pub message: String,
    /// Name of the malformed entry, when the failure is entry-scoped.
    pub entry: Option<String>,
}

fn entry_prefix(entry: Option<&str>) -> String {
    entry.map(|e| format!("entry '{e}': ")).unwrap_or_default()
}

/// Declared content failed a structural precondition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} '{name}': {message}")]
pub struct ValidationError {
    /// Kind of the rejected object.
    pub kind: String,
    /// Name of the rejected object.
    pub name: String,
    /// Why it was rejected.
    pub message: String,
}

/// A mutation returned a non-2xx status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{method} {path} returned {status}: {body}")]
pub struct ApplyError {
    /// HTTP method of the failed request.
    pub method: String,
    /// Path of the failed request.
    pub path: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Classification of a per-object failure in a pass report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection, TLS or timeout failure.
    Transport,
    /// Unparseable wire payload.
    Parse,
    /// Declared content rejected before any network call.
    Validation,
    /// Non-2xx mutation response.
    Apply,
    /// Anything else (configuration, local IO).
    Internal,
}

/// Result type alias for searchsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Returns how this error is reported against a single object.
    #[must_use]
    pub const fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Parse(_) => FailureKind::Parse,
            Self::Validation(_) => FailureKind::Validation,
            Self::Apply(_) => FailureKind::Apply,
            Self::Config(_) | Self::Io(_) => FailureKind::Internal,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a malformed-descriptor error.
    #[must_use]
    pub fn malformed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Returns true for network failures and timeouts.
    ///
    /// Only reads consult this; writes are never retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Classifies a reqwest failure as timeout or network error.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else {
            Self::network(err.to_string())
        }
    }
}

impl ParseError {
    /// Creates a parse error for the whole payload.
    #[must_use]
    pub fn payload(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            entry: None,
        }
    }

    /// Attaches the name of the entry that failed.
    #[must_use]
    pub fn for_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }
}

impl ValidationError {
    /// Creates a validation error for one declared object.
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Parse => "parse",
            Self::Validation => "validation",
            Self::Apply => "apply",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}
