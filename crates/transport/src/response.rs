//! HTTP response as seen by the bridge

use serde::de::DeserializeOwned;

use crate::options::Headers;

/// A fully-read HTTP response: status, headers and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Response with a JSON body and `content-type: application/json`.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        let headers: Headers = [("content-type", "application/json")].into_iter().collect();
        Self::new(status, headers, value.to_string())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Canonical reason phrase for the status code.
    pub fn reason(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown Status")
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_ignore_case(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}
