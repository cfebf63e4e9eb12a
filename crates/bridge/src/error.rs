//! Error types for bridge operations

use serde::Deserialize;
use transport::{Response, TransportError};

/// Status attached to failures that carry no HTTP status of their own.
pub const DEFAULT_STATUS: u16 = 400;

/// Message used when the remote supplies an empty `error_message`.
pub const DEFAULT_MESSAGE: &str = "An error occurred while performing request";

/// Errors from bridge construction and request execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown or incomplete credential/service/auth configuration, or an
    /// unresolved stack name. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote answered with a non-200 status.
    #[error("remote request failed ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The authorization endpoint answered 200 without a usable token.
    #[error("invalid token response: {0}")]
    TokenResponse(String),

    #[error("token storage error: {0}")]
    Storage(#[from] token_cache::Error),
}

impl Error {
    /// HTTP-style status for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Remote { status, .. } => *status,
            Error::Configuration(_) | Error::Storage(_) => 500,
            Error::Transport(_) | Error::TokenResponse(_) => DEFAULT_STATUS,
        }
    }

    /// Build a `Remote` error from a failed response.
    ///
    /// Uses the body's `error_message` when it is a string, otherwise the
    /// status reason phrase.
    pub fn from_response(response: &Response) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error_message: Option<serde_json::Value>,
        }

        let remote = response
            .json::<Envelope>()
            .ok()
            .and_then(|e| e.error_message)
            .and_then(|m| m.as_str().map(str::to_owned));

        let message = match remote {
            Some(m) if m.is_empty() => DEFAULT_MESSAGE.to_owned(),
            Some(m) => m,
            None => response.reason().to_owned(),
        };

        Error::Remote {
            status: response.status(),
            message,
        }
    }
}

/// Result alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
