//! Cached authorization token for one identity

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::store::TokenStore;

/// Validity window applied to every refreshed token, in seconds.
///
/// The authorization endpoint does not report a lifetime, so this is fixed.
pub const TOKEN_TTL_SECS: u64 = 3600;

/// The persisted token record.
///
/// `created` is unix seconds at refresh time; `expires_in` is a delta from it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
    pub expires_in: u64,
    pub created: u64,
}

impl fmt::Debug for TokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPayload")
            .field("token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("created", &self.created)
            .finish()
    }
}

/// Token for a single identity, backed by a `TokenStore` record.
///
/// The payload is only ever replaced as a whole, by `refresh`.
pub struct Token {
    identity: String,
    payload: Option<TokenPayload>,
    store: Arc<TokenStore>,
}

impl Token {
    /// Load the token for `identity`, or start empty if no record exists.
    pub async fn load(identity: impl Into<String>, store: Arc<TokenStore>) -> Result<Self> {
        let identity = identity.into();
        let payload = store.load(&identity).await?;
        Ok(Self {
            identity,
            payload,
            store,
        })
    }

    /// Build a token from a known payload without reading storage.
    pub fn with_payload(
        identity: impl Into<String>,
        payload: TokenPayload,
        store: Arc<TokenStore>,
    ) -> Self {
        Self {
            identity: identity.into(),
            payload: Some(payload),
            store,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&self) -> Option<&TokenPayload> {
        self.payload.as_ref()
    }

    /// Unix seconds at which the token stops being valid.
    pub fn expires_at(&self) -> Option<u64> {
        self.payload
            .as_ref()
            .map(|p| p.created.saturating_add(p.expires_in))
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_secs())
    }

    /// A token is valid while it has a payload and `now - created < expires_in`.
    pub fn is_valid_at(&self, now: u64) -> bool {
        match &self.payload {
            Some(p) => now.saturating_sub(p.created) < p.expires_in,
            None => false,
        }
    }

    /// The cached token string, if any. Does not check validity.
    pub fn current_value(&self) -> Option<&str> {
        self.payload.as_ref().map(|p| p.token.as_str())
    }

    /// Replace the payload with `raw` issued now, then persist it.
    ///
    /// The in-memory payload is updated even when the write fails; the error
    /// is returned so the caller can report the lost durability.
    pub async fn refresh(&mut self, raw: impl Into<String>) -> Result<()> {
        let payload = TokenPayload {
            token: raw.into(),
            expires_in: TOKEN_TTL_SECS,
            created: now_secs(),
        };
        debug!(identity = %self.identity, created = payload.created, "token refreshed");
        let payload = self.payload.insert(payload);
        self.store.save(&self.identity, payload).await
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("identity", &self.identity)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
