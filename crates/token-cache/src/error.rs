//! Error types for token storage

/// Failures reading or writing the durable token record.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token storage I/O error: {0}")]
    Io(String),

    #[error("token serialization error: {0}")]
    Serialize(String),
}

/// Result alias for token storage operations.
pub type Result<T> = std::result::Result<T, Error>;
