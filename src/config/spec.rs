//! Configuration file types.
//!
//! This module defines the structs that map to `searchsync.yaml`: how to
//! reach the cluster, optional extra kind descriptors, and the declared
//! objects themselves.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::kind::ResourceKind;
use crate::record::DesiredRecord;

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Connection parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Reconciliation tuning.
    #[serde(default)]
    pub sync: SyncSettings,
    /// Kinds registered in addition to the built-ins.
    #[serde(default)]
    pub kinds: Vec<ResourceKind>,
    /// Declared objects.
    #[serde(default)]
    pub resources: Vec<DesiredRecord>,
}

/// URL scheme used to reach the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

/// How to reach the cluster's REST API.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// URL scheme.
    #[serde(default)]
    pub protocol: Protocol,
    /// Host name or address.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Basic-auth user.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// PEM file with extra trusted CA certificates.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Directory of PEM files with extra trusted CA certificates.
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub validate_tls: bool,
    /// Proxy URL, optionally with embedded credentials.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Retries for failed reads. Writes are never retried.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
}

/// Reconciliation tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    /// Concurrent mutations per prefix-style kind.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    String::from("localhost")
}

const fn default_port() -> u16 {
    9200
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

const fn default_read_retries() -> u32 {
    2
}

const fn default_workers() -> usize {
    4
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            username: None,
            password: None,
            ca_file: None,
            ca_path: None,
            validate_tls: true,
            proxy: None,
            read_retries: default_read_retries(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl ConnectionConfig {
    /// Returns the base URL of the cluster, with a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/", self.protocol, self.host, self.port)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeout_secs", &self.timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("ca_file", &self.ca_file)
            .field("ca_path", &self.ca_path)
            .field("validate_tls", &self.validate_tls)
            .field("proxy", &self.proxy.as_ref().map(|_| "[set]"))
            .field("read_retries", &self.read_retries)
            .finish()
    }
}

impl SyncConfig {
    /// Returns the declared objects of one kind.
    #[must_use]
    pub fn resources_of(&self, kind: &str) -> Vec<&DesiredRecord> {
        self.resources.iter().filter(|r| r.kind == kind).collect()
    }
}
