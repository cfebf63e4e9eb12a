//! Authorization token cache
//!
//! Holds the short-lived token issued by a gateway's authorization endpoint
//! for one identity (the credential username), decides whether it is still
//! usable, and persists it so a restarted process can pick it up again.
//!
//! Token lifecycle:
//! 1. `Token::load()` reads `token-{identity}.json` from the `TokenStore`, or starts empty
//! 2. `Token::is_valid()` holds while `now - created < expires_in`
//! 3. `Token::refresh()` replaces the whole payload and persists it atomically

pub mod error;
pub mod store;
pub mod token;

pub use error::{Error, Result};
pub use store::TokenStore;
pub use token::{TOKEN_TTL_SECS, Token, TokenPayload, now_secs};
