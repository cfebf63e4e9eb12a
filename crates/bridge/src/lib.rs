//! Authenticated bridges to a family of gateway-hosted API services
//!
//! A `Bridge` is one authenticated channel to one service endpoint. It either
//! sends the credential pair as HTTP basic auth, or exchanges it for a
//! short-lived token at the gateway's authorization endpoint and sends that
//! in `X-Authorization-Token`. A token rejected with 401 is refreshed and the
//! request retried, at most twice per throttle window.
//!
//! Construction flow:
//! 1. `BridgeConfig` names credential sets and service routes
//! 2. `Carpenter::construct_bridge()` validates names and builds a configured `Bridge`
//! 3. `BridgeStack::mount()` optionally keeps it under a name for `resolve()`
//! 4. Caller issues `get`/`post`/`put`/`patch`/`delete` on the bridge

pub mod bridge;
pub mod carpenter;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod stack;

pub use bridge::{Bridge, Outcome, THROTTLE_LIMIT, TOKEN_HEADER};
pub use carpenter::Carpenter;
pub use config::{AuthMethod, BridgeConfig, Credential, CredentialConfig};
pub use error::{Error, Result};
pub use stack::{BridgeStack, SharedBridge};
pub use transport::{Method, Payload, Response};
