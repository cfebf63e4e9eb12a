//! Service routes and endpoint composition
//!
//! All composition is textual: the left side loses its trailing slashes, the
//! right side its leading ones, and exactly one `/` joins them.

use std::collections::HashMap;

use transport::Url;

use crate::error::{Error, Result};

/// Built-in `service name -> path suffix` table.
pub const DEFAULT_SERVICES: &[(&str, &str)] = &[
    ("alchemy", "/alchemy-api/calls"),
    ("conversation", "/conversation/api"),
    ("document_conversion", "/document-conversion/api"),
    ("language_translator", "/language-translator/api"),
    ("natural_language_classifier", "/natural-language-classifier/api"),
    ("personality_insights", "/personality-insights/api"),
    ("retrieve_and_rank", "/retrieve-and-rank/api"),
    ("tone_analyzer", "/tone-analyzer/api"),
    ("speech_to_text", "/speech-to-text/api"),
    ("text_to_speech", "/text-to-speech/api"),
    ("visual_recognition", "/visual-recognition/api"),
    ("alchemydata_news", "/alchemy-api/calls"),
    ("discovery", "/discovery/api"),
    ("tradeoff_analytics", "/tradeoff-analytics/api"),
];

/// Path of the token-issuing service on every gateway host.
pub const AUTHORIZATION_PATH: &str = "/authorization/api/";

pub fn default_services() -> HashMap<String, String> {
    DEFAULT_SERVICES
        .iter()
        .map(|(name, suffix)| ((*name).to_owned(), (*suffix).to_owned()))
        .collect()
}

/// Append a service suffix to a gateway URL.
pub fn join_endpoint(gateway: &Url, suffix: &str) -> Result<Url> {
    let suffix = suffix.trim_start_matches('/');
    if suffix.is_empty() {
        return Ok(gateway.clone());
    }
    let base = gateway.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/{suffix}"))
        .map_err(|e| Error::Configuration(format!("invalid endpoint {base}/{suffix}: {e}")))
}

/// `scheme://host[:port]/authorization/api/` for the host serving `endpoint`.
///
/// The endpoint's path is discarded. A non-default port is kept.
pub fn authorization_endpoint(endpoint: &Url) -> Result<Url> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| Error::Configuration(format!("endpoint {endpoint} has no host")))?;
    let authority = match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    let raw = format!("{}://{authority}{AUTHORIZATION_PATH}", endpoint.scheme());
    Url::parse(&raw)
        .map_err(|e| Error::Configuration(format!("invalid authorization endpoint {raw}: {e}")))
}

/// URL for a request `path` issued against `endpoint`.
///
/// Absolute `http(s)://` paths are used unchanged.
pub fn resolve(endpoint: &Url, path: &str) -> Result<Url> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Url::parse(path)
            .map_err(|e| Error::Configuration(format!("invalid request URL {path}: {e}")));
    }
    join_endpoint(endpoint, path)
}
