//! HTTP transport boundary for bridges
//!
//! Defines the `Transport` trait that decouples the bridge's auth and retry
//! logic from the HTTP client. `ReqwestTransport` is the production
//! implementation; `MockTransport` (feature `test-support`) replays canned
//! responses and records every request for assertions.
//!
//! A transport reports every HTTP response, whatever its status, as `Ok`.
//! `Err` is reserved for failures that produced no response at all.

pub mod options;
pub mod response;
pub mod reqwest_transport;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use options::{BasicAuth, Headers, Payload, RequestOptions};
pub use reqwest::{Method, Url};
pub use reqwest_transport::ReqwestTransport;
pub use response::Response;

#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockTransport, RecordedRequest};

use std::future::Future;
use std::pin::Pin;

/// Failures that prevented an HTTP response from being received.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP request timed out: {0}")]
    Timeout(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Executes one HTTP round trip.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        method: Method,
        url: &'a Url,
        options: &'a RequestOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;
}
