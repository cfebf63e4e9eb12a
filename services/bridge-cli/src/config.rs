//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The default credential set can be supplied entirely through
//! `BRIDGE_USERNAME`, `BRIDGE_PASSWORD` and `BRIDGE_GATEWAY` so the password
//! need not live in the TOML file.

use bridge::BridgeConfig;
use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration: the bridge tables plus CLI-only `[http]` settings.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Outbound HTTP client settings
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();

        if config.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Overlay `BRIDGE_*` variables onto the default credential set.
    fn apply_env(&mut self) {
        if let Some(name) = non_empty_env("BRIDGE_DEFAULT_CREDENTIALS") {
            self.bridge.default_credentials = name;
        }

        let username = non_empty_env("BRIDGE_USERNAME");
        let password = non_empty_env("BRIDGE_PASSWORD");
        let gateway = non_empty_env("BRIDGE_GATEWAY");
        if username.is_none() && password.is_none() && gateway.is_none() {
            return;
        }

        let entry = self
            .bridge
            .credentials
            .entry(self.bridge.default_credentials.clone())
            .or_default();
        if username.is_some() {
            entry.username = username;
        }
        if let Some(password) = password {
            entry.password = Some(Secret::new(password));
        }
        if gateway.is_some() {
            entry.gateway = gateway;
        }
    }

    /// Resolve config file path from CLI arg or BRIDGE_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("BRIDGE_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("bridge.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_KEYS: &[&str] = &[
    "BRIDGE_CONFIG",
    "BRIDGE_DEFAULT_CREDENTIALS",
    "BRIDGE_USERNAME",
    "BRIDGE_PASSWORD",
    "BRIDGE_GATEWAY",
];
