//! Configuration module for searchsync.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `searchsync.yaml`
//! - Environment and `.env` overrides for connection parameters
//! - Validation of configuration values and declared resources

mod parser;
mod spec;
mod validator;

pub use parser::{CONFIG_ENV_VAR, ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{ConnectionConfig, Protocol, SyncConfig, SyncSettings};
pub use validator::{ConfigValidator, FieldError, ValidationResult};
