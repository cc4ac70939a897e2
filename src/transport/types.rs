//! Request and response types exchanged with a [`Transport`](super::Transport).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP verbs used against the administrative API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Read.
    #[default]
    Get,
    /// Full-body write.
    Put,
    /// Full-body write on endpoints that only accept POST.
    Post,
    /// Removal.
    Delete,
}

/// A request relative to the cluster base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path without leading slash, e.g. `_ingest/pipeline/p1`.
    pub path: String,
    /// Query-string pairs.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

/// A raw response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl Method {
    /// Returns true for verbs that are safe to retry.
    #[must_use]
    pub const fn is_idempotent_read(self) -> bool {
        matches!(self, Self::Get)
    }
}

impl ApiRequest {
    /// Creates a request without query or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Appends query-string pairs.
    #[must_use]
    pub fn with_query<'a>(mut self, pairs: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Returns true when the request mutates cluster state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !self.method.is_idempotent_read()
    }
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true for 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} /{}", self.method, self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}
