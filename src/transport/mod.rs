//! Transport to the cluster's REST administrative API.
//!
//! The [`Transport`] trait is the seam between reconciliation logic and the
//! network; [`HttpTransport`] is the production implementation.

mod client;
mod types;

use async_trait::async_trait;

use crate::error::TransportError;

pub use client::HttpTransport;
pub use types::{ApiRequest, ApiResponse, Method};

/// Sends requests to the cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the raw response, whatever its status.
    ///
    /// Implementations may retry reads; writes are sent exactly once.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
