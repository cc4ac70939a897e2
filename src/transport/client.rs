//! HTTP transport over reqwest.
//!
//! One client is built per process from the connection parameters and is
//! read-only afterwards: the connection pool and credentials are shared by
//! every request of a pass.

use async_trait::async_trait;
use reqwest::{Certificate, Client, Proxy, header};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::TransportError;

use super::Transport;
use super::types::{ApiRequest, ApiResponse, Method};

/// Delay between read retries in milliseconds.
const RETRY_DELAY_MS: u64 = 500;

/// Authenticated HTTP client for the cluster's administrative API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client.
    client: Client,
    /// Base URL, e.g. `https://localhost:9200/`.
    base_url: Url,
    /// Basic-auth credentials.
    credentials: Option<(String, Option<String>)>,
    /// Retries for failed reads.
    read_retries: u32,
}

impl HttpTransport {
    /// Creates a transport from connection parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a CA certificate cannot be loaded, the proxy URL
    /// is invalid, or the HTTP client cannot be created.
    pub fn new(connection: &ConnectionConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&connection.base_url()).map_err(|e| TransportError::Client {
            message: format!("invalid cluster URL '{}': {e}", connection.base_url()),
        })?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(connection.timeout_secs))
            .danger_accept_invalid_certs(!connection.validate_tls);

        if !connection.validate_tls {
            warn!("TLS certificate validation is disabled");
        }

        for certificate in load_certificates(connection)? {
            builder = builder.add_root_certificate(certificate);
        }

        if let Some(proxy) = &connection.proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }

        let client = builder.build().map_err(|e| TransportError::Client {
            message: e.to_string(),
        })?;

        let credentials = connection
            .username
            .clone()
            .map(|user| (user, connection.password.clone()));

        debug!("HTTP transport ready for {base_url}");

        Ok(Self {
            client,
            base_url,
            credentials,
            read_retries: connection.read_retries,
        })
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a request path and query against the base URL.
    ///
    /// Each path segment is percent-encoded on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Client {
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(request.path.split('/').filter(|s| !s.is_empty()));

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Sends a single request without retrying.
    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(request)?;
        trace!("{} {url}", request.method);

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, password.as_ref());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        trace!("{request} -> {status}");
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        if request.is_write() {
            return self.send_once(request).await;
        }

        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    debug!("Read of /{} failed ({e}), retry {attempt} of {}", request.path, self.read_retries);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Loads the CA file and every `.pem`/`.crt` file in the CA directory.
fn load_certificates(connection: &ConnectionConfig) -> Result<Vec<Certificate>, TransportError> {
    let mut certificates = Vec::new();

    if let Some(file) = &connection.ca_file {
        certificates.push(read_certificate(file)?);
    }

    if let Some(dir) = &connection.ca_path {
        let entries = std::fs::read_dir(dir).map_err(|e| TransportError::Client {
            message: format!("cannot read CA directory {}: {e}", dir.display()),
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_cert = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "pem" | "crt"));
            if is_cert {
                certificates.push(read_certificate(&path)?);
            }
        }
    }

    Ok(certificates)
}

fn read_certificate(path: &Path) -> Result<Certificate, TransportError> {
    let pem = std::fs::read(path).map_err(|e| TransportError::Client {
        message: format!("cannot read CA certificate {}: {e}", path.display()),
    })?;
    Certificate::from_pem(&pem).map_err(|e| TransportError::Client {
        message: format!("invalid CA certificate {}: {e}", path.display()),
    })
}

/// Builds a proxy, moving credentials embedded in the URL to proxy auth.
fn build_proxy(raw: &str) -> Result<Proxy, TransportError> {
    let invalid = |e: &dyn std::fmt::Display| TransportError::Client {
        message: format!("invalid proxy URL: {e}"),
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(&e))?;
    let username = url.username().to_string();
    let password = url.password().map(String::from);

    if !username.is_empty() {
        url.set_username("").map_err(|()| invalid(&"cannot strip username"))?;
        url.set_password(None).map_err(|()| invalid(&"cannot strip password"))?;
    }

    let proxy = Proxy::all(url.as_str()).map_err(|e| invalid(&e))?;
    Ok(if username.is_empty() {
        proxy
    } else {
        proxy.basic_auth(&username, password.as_deref().unwrap_or_default())
    })
}
