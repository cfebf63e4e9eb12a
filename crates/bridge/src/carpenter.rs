//! Bridge factory
//!
//! The `Carpenter` validates credential, service and auth-method names
//! against a `BridgeConfig` before anything is built, so callers get either
//! a fully configured `Bridge` or a configuration error.

use std::sync::Arc;

use token_cache::TokenStore;
use tracing::info;
use transport::{Transport, Url};

use crate::bridge::Bridge;
use crate::config::{AuthMethod, BridgeConfig, Credential};
use crate::error::{Error, Result};

/// Builds bridges from a shared configuration, transport and token store.
#[derive(Clone)]
pub struct Carpenter {
    config: Arc<BridgeConfig>,
    transport: Arc<dyn Transport>,
    token_store: Arc<TokenStore>,
}

impl Carpenter {
    pub fn new(config: BridgeConfig, transport: Arc<dyn Transport>) -> Self {
        let token_store = Arc::new(TokenStore::new(&config.token_dir));
        Self {
            config: Arc::new(config),
            transport,
            token_store,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn default_credentials(&self) -> &str {
        &self.config.default_credentials
    }

    /// Look up and validate the credential set `name`.
    ///
    /// Blank fields count as missing. The gateway must be an absolute
    /// `http`/`https` URL.
    pub fn credential(&self, name: &str) -> Result<Credential> {
        let entry = self.config.credentials.get(name).ok_or_else(|| {
            Error::Configuration(format!("credential \"{name}\" not found in configuration"))
        })?;
        let missing = |field: &str| {
            Error::Configuration(format!("credential \"{name}\" is missing its {field}"))
        };

        let username = entry
            .username
            .as_ref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| missing("username"))?;
        let password = entry
            .password
            .as_ref()
            .filter(|p| !p.expose().trim().is_empty())
            .ok_or_else(|| missing("password"))?;
        let raw_gateway = entry
            .gateway
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .ok_or_else(|| missing("gateway"))?;

        let gateway = Url::parse(raw_gateway).map_err(|e| {
            Error::Configuration(format!(
                "credential \"{name}\" has invalid gateway {raw_gateway}: {e}"
            ))
        })?;
        if !matches!(gateway.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "credential \"{name}\" gateway must be http or https, got {}",
                gateway.scheme()
            )));
        }

        Ok(Credential {
            username: username.clone(),
            password: password.clone(),
            gateway,
        })
    }

    /// Path suffix for the service `name`.
    pub fn service_suffix(&self, name: &str) -> Result<&str> {
        self.config
            .services
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Configuration(format!("unknown service \"{name}\"")))
    }

    /// Resolve the requested auth method, falling back to the configured
    /// default, and check it is enabled.
    pub fn auth_method(&self, requested: Option<AuthMethod>) -> Result<AuthMethod> {
        let method = requested.unwrap_or(self.config.default_auth_method);
        if !self.config.auth_methods.contains(&method) {
            return Err(Error::Configuration(format!(
                "auth method \"{method}\" is not enabled"
            )));
        }
        Ok(method)
    }

    /// Build a bridge for `credential` (the default set when `None`),
    /// optionally routed to `service` and using `auth`.
    ///
    /// Issues no network requests. Token mode only reads the token cache.
    pub async fn construct_bridge(
        &self,
        credential: Option<&str>,
        service: Option<&str>,
        auth: Option<AuthMethod>,
    ) -> Result<Bridge> {
        let credential_name = credential.unwrap_or(&self.config.default_credentials);
        let credential = self.credential(credential_name)?;
        let suffix = service.map(|s| self.service_suffix(s)).transpose()?;
        let auth_method = self.auth_method(auth)?;

        let mut bridge = Bridge::new(
            credential,
            Arc::clone(&self.transport),
            Arc::clone(&self.token_store),
        );
        if let Some(suffix) = suffix {
            bridge.using_service_suffix(suffix)?;
        }
        bridge.use_auth_method(auth_method).await?;
        bridge.append_headers([(
            self.config.opt_out_header.clone(),
            self.config.learning_opt_out.to_string(),
        )]);

        info!(
            credential = credential_name,
            service = service.unwrap_or("-"),
            auth = %auth_method,
            endpoint = %bridge.endpoint(),
            "bridge constructed"
        );
        Ok(bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use token_cache::{TOKEN_TTL_SECS, TokenPayload, now_secs};
    use transport::MockTransport;

    fn config(dir: &std::path::Path) -> BridgeConfig {
        let mut config: BridgeConfig = toml::from_str(
            r#"
[credentials.default]
username = "SomeUsername"
password = "SomePassword"
gateway = "https://gateway.example.com"

[credentials.other]
username = "OtherUser"
password = "OtherPassword"
gateway = "https://other.example.com/api/"

[credentials.no_password]
username = "nobody"
gateway = "https://gateway.example.com"

[credentials.blank_user]
username = "   "
password = "x"
gateway = "https://gateway.example.com"

[credentials.ftp]
username = "u"
password = "p"
gateway = "ftp://files.example.com"
"#,
        )
        .unwrap();
        config.token_dir = dir.to_path_buf();
        config
    }

    fn carpenter(config: BridgeConfig, mock: &MockTransport) -> Carpenter {
        Carpenter::new(config, Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn default_credentials_build_plain_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let bridge = carpenter(config(dir.path()), &mock)
            .construct_bridge(None, None, None)
            .await
            .unwrap();

        assert_eq!(bridge.username(), "SomeUsername");
        assert_eq!(bridge.endpoint().as_str(), "https://gateway.example.com/");
        assert_eq!(bridge.auth_method(), AuthMethod::Credentials);
        assert!(bridge.token().is_none());
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn service_suffix_is_appended_to_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let carpenter = carpenter(config(dir.path()), &MockTransport::new());

        let bridge = carpenter
            .construct_bridge(Some("other"), Some("conversation"), None)
            .await
            .unwrap();
        assert_eq!(
            bridge.endpoint().as_str(),
            "https://other.example.com/api/conversation/api"
        );
        assert_eq!(bridge.gateway().as_str(), "https://other.example.com/api/");
    }

    #[tokio::test]
    async fn unknown_credential_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let carpenter = carpenter(config(dir.path()), &MockTransport::new());

        let err = carpenter
            .construct_bridge(Some("nope"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("nope"));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn incomplete_credentials_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let carpenter = carpenter(config(dir.path()), &MockTransport::new());

        let err = carpenter
            .construct_bridge(Some("no_password"), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("password"), "got: {err}");

        let err = carpenter
            .construct_bridge(Some("blank_user"), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("username"), "got: {err}");
    }

    #[test]
    fn gateway_must_be_http() {
        let dir = tempfile::tempdir().unwrap();
        let carpenter = carpenter(config(dir.path()), &MockTransport::new());
        let err = carpenter.credential("ftp").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("ftp"));
    }

    #[tokio::test]
    async fn unknown_service_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let carpenter = carpenter(config(dir.path()), &MockTransport::new());

        let err = carpenter
            .construct_bridge(None, Some("weather"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("weather"));
    }

    #[tokio::test]
    async fn token_mode_binds_token_by_username() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path())
            .save(
                "SomeUsername",
                &TokenPayload {
                    token: "cached".into(),
                    expires_in: TOKEN_TTL_SECS,
                    created: now_secs(),
                },
            )
            .await
            .unwrap();
        let mock = MockTransport::new();
        let carpenter = carpenter(config(dir.path()), &mock);

        let bridge = carpenter
            .construct_bridge(None, Some("tone_analyzer"), Some(AuthMethod::Token))
            .await
            .unwrap();

        let token = bridge.token().unwrap();
        assert_eq!(token.identity(), "SomeUsername");
        assert_eq!(token.current_value(), Some("cached"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn configured_default_auth_method_applies() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.default_auth_method = AuthMethod::Token;
        let carpenter = carpenter(config, &MockTransport::new());

        let bridge = carpenter.construct_bridge(None, None, None).await.unwrap();
        assert_eq!(bridge.auth_method(), AuthMethod::Token);
        assert!(bridge.token().is_some());
    }

    #[tokio::test]
    async fn disabled_auth_method_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.auth_methods = vec![AuthMethod::Credentials];
        let carpenter = carpenter(config, &MockTransport::new());

        let err = carpenter
            .construct_bridge(None, None, Some(AuthMethod::Token))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn opt_out_header_is_sent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.learning_opt_out = true;
        let mock = MockTransport::new();
        mock.push_json(200, json!({}));
        let carpenter = carpenter(config, &mock);

        let mut bridge = carpenter.construct_bridge(None, None, None).await.unwrap();
        assert_eq!(bridge.headers().get("X-Learning-Opt-Out"), Some("true"));
        assert_eq!(bridge.headers().get("Accept"), Some("application/json"));

        bridge.get("v1/ping", &[]).await.unwrap();
        assert_eq!(
            mock.requests()[0].options.headers.get("X-Learning-Opt-Out"),
            Some("true")
        );
    }

    #[tokio::test]
    async fn custom_opt_out_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.opt_out_header = "X-Watson-Learning-Opt-Out".into();
        let carpenter = carpenter(config, &MockTransport::new());

        let bridge = carpenter.construct_bridge(None, None, None).await.unwrap();
        assert_eq!(
            bridge.headers().get("X-Watson-Learning-Opt-Out"),
            Some("false")
        );
        assert!(bridge.headers().get("X-Learning-Opt-Out").is_none());
    }

    #[test]
    fn auth_method_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let carpenter = carpenter(config(dir.path()), &MockTransport::new());
        assert_eq!(carpenter.auth_method(None).unwrap(), AuthMethod::Credentials);
        assert_eq!(
            carpenter.auth_method(Some(AuthMethod::Token)).unwrap(),
            AuthMethod::Token
        );
        assert_eq!(carpenter.default_credentials(), "default");
    }
}
