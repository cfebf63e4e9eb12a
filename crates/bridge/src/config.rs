//! Bridge configuration
//!
//! `BridgeConfig` is plain data handed to the `Carpenter`; loading it from a
//! file or the environment is the host application's job.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use common::Secret;
use serde::{Deserialize, Serialize};
use transport::Url;

use crate::error::{Error, Result};
use crate::routes;

/// How a bridge authenticates its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// HTTP basic auth with the credential pair on every request.
    Credentials,
    /// Cached token from the authorization endpoint, refreshed on 401.
    Token,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Credentials => "credentials",
            AuthMethod::Token => "token",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "credentials" => Ok(AuthMethod::Credentials),
            "token" => Ok(AuthMethod::Token),
            other => Err(Error::Configuration(format!(
                "unrecognized auth method \"{other}\", expected \"credentials\" or \"token\""
            ))),
        }
    }
}

/// A named credential set as written in configuration.
///
/// Fields are optional so that an incomplete set is reported by the
/// `Carpenter` as a configuration error rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialConfig {
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    pub gateway: Option<String>,
}

/// A validated credential set bound to a bridge.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: Secret<String>,
    pub gateway: Url,
}

/// Root bridge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Credential set used when the caller names none.
    pub default_credentials: String,
    pub credentials: HashMap<String, CredentialConfig>,
    /// `service name -> path suffix`; replaces the built-in table when given.
    pub services: HashMap<String, String>,
    pub default_auth_method: AuthMethod,
    /// Auth methods callers may select.
    pub auth_methods: Vec<AuthMethod>,
    pub learning_opt_out: bool,
    pub opt_out_header: String,
    /// Directory holding `token-{username}.json` records.
    pub token_dir: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_credentials: "default".into(),
            credentials: HashMap::new(),
            services: routes::default_services(),
            default_auth_method: AuthMethod::Credentials,
            auth_methods: vec![AuthMethod::Credentials, AuthMethod::Token],
            learning_opt_out: false,
            opt_out_header: "X-Learning-Opt-Out".into(),
            token_dir: PathBuf::from(".bridge-tokens"),
        }
    }
}
