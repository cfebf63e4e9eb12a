//! Bridge CLI
//!
//! Issues one authenticated request through a bridge:
//! 1. Loads the TOML config and overlays `BRIDGE_*` environment variables
//! 2. Builds a bridge for the requested credential set, service and auth method
//! 3. Sends the request and writes the response body to stdout
//!
//! Logs are JSON on stderr, filtered by `LOG_LEVEL` or `RUST_LOG`.

mod cli;
mod config;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bridge::Carpenter;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::ReqwestTransport;

use crate::cli::Args;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    let body = run(&args).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&body)
        .and_then(|()| stdout.flush())
        .context("failed to write response body")?;
    Ok(())
}

/// Load config, build the bridge and send the request. Returns the body of
/// the 200 response.
async fn run(args: &Args) -> Result<Vec<u8>> {
    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        credentials = config.bridge.credentials.len(),
        services = config.bridge.services.len(),
        default_auth = %config.bridge.default_auth_method,
        timeout_secs = config.http.timeout_secs,
        "configuration loaded"
    );

    let transport = ReqwestTransport::new(reqwest::Client::new())
        .with_timeout(Duration::from_secs(config.http.timeout_secs));
    let carpenter = Carpenter::new(config.bridge, Arc::new(transport));

    let mut bridge = carpenter
        .construct_bridge(
            args.credentials.as_deref(),
            args.service.as_deref(),
            args.auth,
        )
        .await
        .context("failed to construct bridge")?;

    let response = bridge
        .send(args.method.clone(), &args.path, args.payload())
        .await
        .with_context(|| format!("{} {} failed", args.method, args.path))?;

    info!(
        status = response.status(),
        bytes = response.body().len(),
        "request completed"
    );
    Ok(response.into_body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    fn header(headers: &HeaderMap, name: &str) -> Value {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_owned()))
            .unwrap_or(Value::Null)
    }

    /// Start a gateway that issues `tok-1`, `tok-2`, ... and serves:
    /// - `/conversation/api/v1/echo`: echoes auth headers and query
    /// - `/conversation/api/v1/guarded`: 401 unless the token is `tok-2`
    async fn start_gateway() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let issued = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&issued);
        let app = axum::Router::new()
            .route(
                "/authorization/api/v1/token",
                get(move |headers: HeaderMap, RawQuery(query): RawQuery| {
                    let counter = Arc::clone(&counter);
                    async move {
                        let basic = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .is_some_and(|v| v.starts_with("Basic "));
                        let has_url = query.is_some_and(|q| q.starts_with("url="));
                        if !basic || !has_url {
                            return (
                                StatusCode::UNAUTHORIZED,
                                axum::Json(json!({"error_message": "bad credentials"})),
                            );
                        }
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        (StatusCode::OK, axum::Json(json!({"token": format!("tok-{n}")})))
                    }
                }),
            )
            .route(
                "/conversation/api/v1/echo",
                get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                    axum::Json(json!({
                        "token": header(&headers, "x-authorization-token"),
                        "basic": headers.contains_key("authorization"),
                        "opt_out": header(&headers, "x-learning-opt-out"),
                        "query": query,
                    }))
                }),
            )
            .route(
                "/conversation/api/v1/guarded",
                get(|headers: HeaderMap| async move {
                    if header(&headers, "x-authorization-token") == json!("tok-2") {
                        (StatusCode::OK, axum::Json(json!({"someData": "data"})))
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            axum::Json(json!({"error_message": "unauthorized"})),
                        )
                    }
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, issued)
    }

    fn write_config(dir: &Path, gateway: &str) -> PathBuf {
        let path = dir.join("bridge.toml");
        let contents = format!(
            r#"
token_dir = "{}"

[credentials.default]
username = "SomeUsername"
password = "SomePassword"
gateway = "{gateway}"

[http]
timeout_secs = 5
"#,
            dir.join("tokens").display()
        );
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn args(config: &Path, extra: &[&str]) -> Args {
        let mut all = vec!["--config".to_string(), config.display().to_string()];
        all.extend(extra.iter().map(|s| s.to_string()));
        Args::parse(all).unwrap()
    }

    fn clear_env() {
        for key in config::ENV_KEYS {
            // SAFETY: callers hold ENV_MUTEX.
            unsafe { std::env::remove_var(key) };
        }
    }

    #[tokio::test]
    async fn credentials_request_end_to_end() {
        let _lock = config::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let (gateway, issued) = start_gateway().await;
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &gateway);

        let body = run(&args(
            &config,
            &[
                "--service",
                "conversation",
                "--query",
                "version=2017-05-26",
                "GET",
                "v1/echo",
            ],
        ))
        .await
        .unwrap();

        let echo: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echo["basic"], true);
        assert_eq!(echo["token"], Value::Null);
        assert_eq!(echo["opt_out"], "false");
        assert_eq!(echo["query"], "version=2017-05-26");
        assert_eq!(issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_request_fetches_and_persists_token() {
        let _lock = config::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let (gateway, issued) = start_gateway().await;
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &gateway);

        let body = run(&args(
            &config,
            &["--service", "conversation", "--auth", "token", "GET", "v1/echo"],
        ))
        .await
        .unwrap();

        let echo: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echo["token"], "tok-1");
        assert_eq!(echo["basic"], false);
        assert_eq!(issued.load(Ordering::SeqCst), 1);

        let record = std::fs::read_to_string(dir.path().join("tokens/token-SomeUsername.json"))
            .unwrap();
        let record: Value = serde_json::from_str(&record).unwrap();
        assert_eq!(record["token"], "tok-1");
        assert_eq!(record["expires_in"], 3600);

        // Second run reuses the cached token.
        run(&args(
            &config,
            &["--service", "conversation", "--auth", "token", "GET", "v1/echo"],
        ))
        .await
        .unwrap();
        assert_eq!(issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_over_http() {
        let _lock = config::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let (gateway, issued) = start_gateway().await;
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &gateway);

        let body = run(&args(
            &config,
            &["--service", "conversation", "--auth", "token", "GET", "v1/guarded"],
        ))
        .await
        .unwrap();

        assert_eq!(body, br#"{"someData":"data"}"#);
        assert_eq!(issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn remote_failure_is_reported() {
        let _lock = config::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let (gateway, _) = start_gateway().await;
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &gateway);

        let err = run(&args(&config, &["--service", "conversation", "GET", "v1/missing"]))
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("GET v1/missing failed"), "got: {message}");
        assert!(message.contains("404"), "got: {message}");
    }

    #[tokio::test]
    async fn unknown_service_fails_construction() {
        let _lock = config::ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "http://127.0.0.1:9");

        let err = run(&args(&config, &["--service", "weather", "GET", "v1/x"]))
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("failed to construct bridge"), "got: {message}");
        assert!(message.contains("weather"), "got: {message}");
    }
}
