//! Configuration validation.
//!
//! Everything here is fatal and runs at startup, before any network call:
//! connection parameters, custom kind descriptors and the declared resource
//! list (unknown kinds, duplicate names).

use crate::error::{ConfigError, Result};
use crate::kind::KindRegistry;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::spec::{ConnectionConfig, Protocol, SyncConfig, SyncSettings};

/// Validator for sync configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<FieldError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct FieldError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a sync configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is invalid, a descriptor is malformed, a
    /// resource names an unknown kind, or an object is declared twice.
    pub fn validate(&self, config: &SyncConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_connection(&config.connection, &mut result);
        Self::validate_sync(config.sync, &mut result);

        if let Some(first_error) = result.errors.first() {
            return Err(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }
            .into());
        }

        self.build_registry(config)?;

        if config.resources.is_empty() {
            result.warnings.push(String::from("No resources declared in configuration"));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Registers the built-in kinds plus the configured ones and checks every
    /// declared resource against them.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor is malformed or clashes with another
    /// kind, a resource names an unknown kind, or an object is declared twice.
    pub fn build_registry(&self, config: &SyncConfig) -> std::result::Result<KindRegistry, ConfigError> {
        let mut registry = KindRegistry::with_builtins();
        for kind in &config.kinds {
            registry.register(kind.clone())?;
        }

        let mut seen = HashSet::new();
        for resource in &config.resources {
            registry.resolve(&resource.kind)?;
            if !seen.insert((resource.kind.as_str(), resource.name.as_str())) {
                return Err(ConfigError::DuplicateName {
                    kind: resource.kind.clone(),
                    name: resource.name.clone(),
                });
            }
        }

        debug!("Registered {} kind(s)", registry.len());
        Ok(registry)
    }

    /// Validates connection parameters.
    fn validate_connection(connection: &ConnectionConfig, result: &mut ValidationResult) {
        if connection.host.trim().is_empty() {
            result.error("connection.host", "Host cannot be empty");
        }

        if connection.port == 0 {
            result.error("connection.port", "Port must be between 1 and 65535");
        }

        if connection.timeout_secs == 0 {
            result.error("connection.timeout_secs", "Timeout must be at least 1 second");
        }

        match (&connection.username, &connection.password) {
            (Some(_), None) => result.error("connection.password", "A username needs a password"),
            (None, Some(_)) => result.error("connection.username", "A password needs a username"),
            _ => {}
        }

        if let Some(dir) = &connection.ca_path
            && !dir.is_dir()
        {
            result.error(
                "connection.ca_path",
                format!("CA path {} is not a directory", dir.display()),
            );
        }

        if !connection.validate_tls {
            result
                .warnings
                .push(String::from("connection.validate_tls: certificate validation is disabled"));
        }

        if connection.protocol == Protocol::Http && connection.password.is_some() {
            result
                .warnings
                .push(String::from("connection.protocol: credentials will be sent over plain HTTP"));
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }
    }

    /// Validates reconciliation tuning.
    fn validate_sync(sync: SyncSettings, result: &mut ValidationResult) {
        if sync.workers == 0 {
            result.error("sync.workers", "Workers must be at least 1");
        }
    }
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}
