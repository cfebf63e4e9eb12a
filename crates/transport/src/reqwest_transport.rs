//! Production transport on top of `reqwest`

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::options::{Headers, Payload};
use crate::{Method, RequestOptions, Response, Result, Transport, TransportError, Url};

/// `reqwest::Client` wrapper that applies `RequestOptions` and reads the whole body.
///
/// No retries, redirects policy or pooling decisions are made here beyond
/// what the wrapped client is configured with.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Per-request timeout applied on top of the client's own settings.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Transport for ReqwestTransport {
    fn execute<'a>(
        &'a self,
        method: Method,
        url: &'a Url,
        options: &'a RequestOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>> {
        Box::pin(async move {
            let mut request = self
                .client
                .request(method, url.clone())
                .headers(header_map(&options.headers));

            if let Some(auth) = &options.basic_auth {
                request = request.basic_auth(&auth.username, Some(auth.password.expose()));
            }

            if !options.payload.is_empty() {
                request = match &options.payload {
                    Payload::Query(pairs) => request.query(pairs),
                    Payload::Json(value) => request.json(value),
                    Payload::Form(pairs) => request.form(pairs),
                    Payload::Body(bytes) => request.body(bytes.clone()),
                    Payload::Empty => request,
                };
            }

            if let Some(timeout) = self.timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        value.to_str().unwrap_or_default().to_owned(),
                    )
                })
                .collect();
            let body = response.bytes().await.map_err(classify)?;

            debug!(status, bytes = body.len(), "response received");
            Ok(Response::new(status, headers, body.to_vec()))
        })
    }
}

/// Convert bridge headers, skipping names or values `http` rejects.
fn header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let header_name = match HeaderName::from_str(name) {
            Ok(n) => n,
            Err(e) => {
                warn!(header = %name, error = %e, "skipping invalid header name");
                continue;
            }
        };
        let header_value = match HeaderValue::from_str(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(header = %name, error = %e, "skipping invalid header value");
                continue;
            }
        };
        map.insert(header_name, header_value);
    }
    map
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}
