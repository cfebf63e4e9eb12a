//! Common types shared by the bridge crates and the CLI

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
