//! Mock transport for unit testing without a real gateway.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! transport = { workspace = true, features = ["test-support"] }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::{Method, RequestOptions, Response, Result, Transport, TransportError, Url};

/// A request observed by `MockTransport`.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub options: RequestOptions,
}

/// Replays queued outcomes in order and records every request.
///
/// Clones share the same queue and log, so a test can keep one handle while
/// the bridge owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    outcomes: Arc<Mutex<VecDeque<Result<Response>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: Response) -> &Self {
        lock(&self.outcomes).push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: u16, value: serde_json::Value) -> &Self {
        self.push_response(Response::json_body(status, &value))
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        lock(&self.outcomes).push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Outcomes queued but not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.outcomes).len()
    }
}

impl Transport for MockTransport {
    fn execute<'a>(
        &'a self,
        method: Method,
        url: &'a Url,
        options: &'a RequestOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>> {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.clone(),
            options: options.clone(),
        });
        let outcome = lock(&self.outcomes).pop_front().unwrap_or_else(|| {
            Err(TransportError::Request(format!(
                "mock transport has no queued response for {url}"
            )))
        });
        Box::pin(async move { outcome })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
