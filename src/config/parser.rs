//! Configuration parser for loading configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{Protocol, SyncConfig};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "SEARCHSYNC_CONFIG";

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["searchsync.yaml", "searchsync.yml"];

/// Configuration parser for loading sync configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<SyncConfig> {
        debug!("Parsing YAML configuration");

        let config: SyncConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        debug!(
            "Parsed {} resource(s) and {} custom kind(s)",
            config.resources.len(),
            config.kinds.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Connection parameters can be overridden with `SEARCHSYNC_<KEY>`
    /// (e.g. `SEARCHSYNC_HOST`, `SEARCHSYNC_PASSWORD`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// holds an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(
        config: &mut SyncConfig,
        var: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<(), ConfigError> {
        let connection = &mut config.connection;

        if let Some(protocol) = var("SEARCHSYNC_PROTOCOL") {
            debug!("Overriding connection.protocol from environment");
            connection.protocol = match protocol.to_ascii_lowercase().as_str() {
                "http" => Protocol::Http,
                "https" => Protocol::Https,
                other => {
                    return Err(ConfigError::validation(
                        format!("Unknown protocol '{other}' in SEARCHSYNC_PROTOCOL"),
                        "connection.protocol",
                    ));
                }
            };
        }

        if let Some(host) = var("SEARCHSYNC_HOST") {
            debug!("Overriding connection.host from environment");
            connection.host = host;
        }

        if let Some(port) = var("SEARCHSYNC_PORT") {
            debug!("Overriding connection.port from environment");
            connection.port = port.parse().map_err(|_| {
                ConfigError::validation(
                    format!("Invalid port '{port}' in SEARCHSYNC_PORT"),
                    "connection.port",
                )
            })?;
        }

        if let Some(username) = var("SEARCHSYNC_USERNAME") {
            debug!("Overriding connection.username from environment");
            connection.username = Some(username);
        }

        if let Some(password) = var("SEARCHSYNC_PASSWORD") {
            debug!("Overriding connection.password from environment");
            connection.password = Some(password);
        }

        if let Some(proxy) = var("SEARCHSYNC_PROXY") {
            debug!("Overriding connection.proxy from environment");
            connection.proxy = Some(proxy);
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds the configuration file.
///
/// Searches `start_dir` and its parents, then the user configuration
/// directory (`<config dir>/searchsync/`). A relative `start_dir` is resolved
/// against the working directory first.
///
/// # Errors
///
/// Returns an error if no configuration file is found or the working
/// directory cannot be determined.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = search_start(start_dir.as_ref())?;
    let mut current = start.clone();

    loop {
        if let Some(found) = find_in(&current) {
            return Ok(found);
        }
        if !current.pop() {
            break;
        }
    }

    if let Some(found) = dirs::config_dir().and_then(|dir| find_in(&dir.join("searchsync"))) {
        return Ok(found);
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

/// Makes the search start absolute so that popping reaches the root.
fn search_start(start: &Path) -> std::io::Result<PathBuf> {
    std::path::absolute(start)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
        .inspect(|path| info!("Found configuration file: {}", path.display()))
}
