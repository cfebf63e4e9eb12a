//! Bridge request execution and token auth state machine
//!
//! Every verb funnels into `Bridge::send`, which loops over:
//! 1. build options (basic auth, or the token header from `get_token`)
//! 2. execute through the transport
//! 3. classify the response into an `Outcome`
//!
//! A 401 in token mode while `throttle < THROTTLE_LIMIT` forces a token
//! fetch (incrementing the throttle) and goes round again. Any other non-200,
//! a failed refresh or a transport error resets the throttle and fails. A successful retry leaves the throttle
//! where it is, so a bridge that recovered once has one retry left for its
//! next 401.

use std::fmt;
use std::sync::Arc;

use common::Secret;
use serde::Deserialize;
use token_cache::{Token, TokenStore};
use tracing::{debug, info, instrument, warn};
use transport::{BasicAuth, Headers, Method, Payload, RequestOptions, Response, Transport, Url};

use crate::config::{AuthMethod, Credential};
use crate::error::{Error, Result};
use crate::{metrics, routes};

/// Header carrying the token in token mode.
pub const TOKEN_HEADER: &str = "X-Authorization-Token";

/// Forced token refreshes allowed before a 401 becomes fatal.
pub const THROTTLE_LIMIT: u32 = 2;

/// Token-issuing path under the authorization endpoint.
const TOKEN_PATH: &str = "v1/token";

/// Result of one round trip as seen by the retry loop.
#[derive(Debug)]
pub enum Outcome {
    Success(Response),
    /// 401 in token mode with retry budget left.
    RecoverableAuthFailure,
    Fatal(Error),
}

impl Outcome {
    /// Classify a response. Only status 200 is a success.
    pub fn classify(response: Response, auth_method: AuthMethod, throttle: u32) -> Self {
        match response.status() {
            200 => Outcome::Success(response),
            401 if auth_method == AuthMethod::Token && throttle < THROTTLE_LIMIT => {
                Outcome::RecoverableAuthFailure
            }
            _ => Outcome::Fatal(Error::from_response(&response)),
        }
    }
}

/// One authenticated channel to one service endpoint.
pub struct Bridge {
    username: String,
    password: Secret<String>,
    gateway: Url,
    endpoint: Url,
    auth_method: AuthMethod,
    headers: Headers,
    token: Option<Token>,
    token_store: Arc<TokenStore>,
    throttle: u32,
    transport: Arc<dyn Transport>,
}

impl Bridge {
    /// Credentials-mode bridge whose endpoint is the gateway itself.
    pub fn new(
        credential: Credential,
        transport: Arc<dyn Transport>,
        token_store: Arc<TokenStore>,
    ) -> Self {
        Self {
            username: credential.username,
            password: credential.password,
            endpoint: credential.gateway.clone(),
            gateway: credential.gateway,
            auth_method: AuthMethod::Credentials,
            headers: [("Accept", "application/json")].into_iter().collect(),
            token: None,
            token_store,
            throttle: 0,
            transport,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn gateway(&self) -> &Url {
        &self.gateway
    }

    /// Base URL that relative request paths are appended to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The bound token; `None` in credentials mode.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn throttle(&self) -> u32 {
        self.throttle
    }

    /// Merge `headers` into the defaults; later entries win.
    pub fn append_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.merge(headers);
        self
    }

    /// Point the endpoint at `gateway + suffix`.
    pub fn using_service_suffix(&mut self, suffix: &str) -> Result<&mut Self> {
        self.endpoint = routes::join_endpoint(&self.gateway, suffix)?;
        Ok(self)
    }

    /// Switch auth mode. Token mode binds the cached token for this
    /// bridge's username; credentials mode drops it.
    pub async fn use_auth_method(&mut self, method: AuthMethod) -> Result<&mut Self> {
        match method {
            AuthMethod::Token => {
                if self.token.is_none() {
                    let token =
                        Token::load(self.username.clone(), Arc::clone(&self.token_store)).await?;
                    debug!(identity = %self.username, cached = token.has_payload(), "token bound");
                    self.token = Some(token);
                }
            }
            AuthMethod::Credentials => self.token = None,
        }
        self.auth_method = method;
        Ok(self)
    }

    pub fn authorization_endpoint(&self) -> Result<Url> {
        routes::authorization_endpoint(&self.endpoint)
    }

    fn basic_auth(&self) -> BasicAuth {
        BasicAuth {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Options for the next request: headers plus basic auth in credentials
    /// mode, or headers plus the token header in token mode.
    ///
    /// In token mode this may fetch a token first.
    pub async fn request_options(&mut self, payload: Payload) -> Result<RequestOptions> {
        let mut headers = self.headers.clone();
        let basic_auth = match self.auth_method {
            AuthMethod::Credentials => Some(self.basic_auth()),
            AuthMethod::Token => {
                let token = self.get_token().await?;
                headers.insert(TOKEN_HEADER, token);
                None
            }
        };
        Ok(RequestOptions {
            headers,
            basic_auth,
            payload,
        })
    }

    /// The cached token if still valid, otherwise a freshly fetched one.
    pub async fn get_token(&mut self) -> Result<String> {
        if let Some(value) = self
            .token
            .as_ref()
            .filter(|t| t.is_valid())
            .and_then(Token::current_value)
        {
            return Ok(value.to_owned());
        }
        self.fetch_token(false).await
    }

    /// Request a new token from the authorization endpoint and cache it.
    ///
    /// Authenticates with the credential pair. The service endpoint is sent
    /// as the `url` query parameter and is itself left untouched.
    #[instrument(skip_all, fields(identity = %self.username, increment_throttle = increment_throttle))]
    pub async fn fetch_token(&mut self, increment_throttle: bool) -> Result<String> {
        if increment_throttle {
            self.throttle += 1;
        }

        let url = routes::resolve(&self.authorization_endpoint()?, TOKEN_PATH)?;
        let options = RequestOptions {
            headers: self.headers.clone(),
            basic_auth: Some(self.basic_auth()),
            payload: Payload::query([("url", self.endpoint.as_str())]),
        };

        debug!(url = %url, throttle = self.throttle, "requesting token");
        let response = self.transport.execute(Method::GET, &url, &options).await?;
        metrics::record_request(&Method::GET, response.status());
        if response.status() != 200 {
            return Err(Error::from_response(&response));
        }

        #[derive(Deserialize)]
        struct TokenBody {
            token: String,
        }

        let value = response
            .json::<TokenBody>()
            .map_err(|e| Error::TokenResponse(e.to_string()))?
            .token;
        if value.is_empty() {
            return Err(Error::TokenResponse("empty token".into()));
        }

        let token = match self.token.take() {
            Some(token) => token,
            None => Token::load(self.username.clone(), Arc::clone(&self.token_store)).await?,
        };
        let token = self.token.insert(token);
        if let Err(e) = token.refresh(value.clone()).await {
            warn!(error = %e, "token refreshed in memory but not persisted");
            metrics::record_token_persist_failure();
        }

        metrics::record_token_refresh();
        info!(throttle = self.throttle, "token refreshed");
        Ok(value)
    }

    /// Issue a request, refreshing the token and retrying on 401 in token mode.
    ///
    /// Every failure, including a failed refresh or a transport error,
    /// resets the throttle before it is returned.
    #[instrument(skip_all, fields(method = %method, path = %path, auth = %self.auth_method))]
    pub async fn send(&mut self, method: Method, path: &str, payload: Payload) -> Result<Response> {
        let url = routes::resolve(&self.endpoint, path)?;
        let result = self.execute_with_retry(&method, &url, &payload).await;
        if result.is_err() {
            self.throttle = 0;
        }
        result
    }

    async fn execute_with_retry(
        &mut self,
        method: &Method,
        url: &Url,
        payload: &Payload,
    ) -> Result<Response> {
        loop {
            let options = self.request_options(payload.clone()).await?;
            let response = self.transport.execute(method.clone(), url, &options).await?;
            metrics::record_request(method, response.status());
            debug!(status = response.status(), throttle = self.throttle, "response received");

            match Outcome::classify(response, self.auth_method, self.throttle) {
                Outcome::Success(response) => return Ok(response),
                Outcome::RecoverableAuthFailure => {
                    warn!(throttle = self.throttle, "token rejected, refreshing");
                    self.fetch_token(true).await?;
                }
                Outcome::Fatal(error) => return Err(error),
            }
        }
    }

    /// GET with `query` appended to the URL.
    pub async fn get(&mut self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        self.send(Method::GET, path, Payload::query(query.iter().copied()))
            .await
    }

    pub async fn post(&mut self, path: &str, payload: Payload) -> Result<Response> {
        self.send(Method::POST, path, payload).await
    }

    pub async fn put(&mut self, path: &str, payload: Payload) -> Result<Response> {
        self.send(Method::PUT, path, payload).await
    }

    pub async fn patch(&mut self, path: &str, payload: Payload) -> Result<Response> {
        self.send(Method::PATCH, path, payload).await
    }

    pub async fn delete(&mut self, path: &str, payload: Payload) -> Result<Response> {
        self.send(Method::DELETE, path, payload).await
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("username", &self.username)
            .field("password", &self.password)
            .field("endpoint", &self.endpoint.as_str())
            .field("auth_method", &self.auth_method)
            .field("headers", &self.headers)
            .field("token", &self.token)
            .field("throttle", &self.throttle)
            .finish()
    }
}
