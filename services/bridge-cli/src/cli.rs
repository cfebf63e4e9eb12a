//! Command-line arguments
//!
//! ```text
//! bridge [--config PATH] [--credentials NAME] [--service NAME] [--auth credentials|token]
//!        [--query KEY=VALUE]... METHOD PATH [JSON_BODY]
//! ```

use anyhow::{Context, Result, bail};
use bridge::{AuthMethod, Method, Payload};

pub const USAGE: &str = "usage: bridge [--config PATH] [--credentials NAME] [--service NAME] \
[--auth credentials|token] [--query KEY=VALUE]... METHOD PATH [JSON_BODY]";

/// Parsed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub config: Option<String>,
    pub credentials: Option<String>,
    pub service: Option<String>,
    pub auth: Option<AuthMethod>,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut credentials = None;
        let mut service = None;
        let mut auth = None;
        let mut query = Vec::new();
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .with_context(|| format!("{flag} requires a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--config" => config = Some(value("--config")?),
                "--credentials" => credentials = Some(value("--credentials")?),
                "--service" => service = Some(value("--service")?),
                "--auth" => auth = Some(value("--auth")?.parse::<AuthMethod>()?),
                "--query" => {
                    let pair = value("--query")?;
                    let (key, val) = pair
                        .split_once('=')
                        .with_context(|| format!("--query expects KEY=VALUE, got {pair}"))?;
                    query.push((key.to_owned(), val.to_owned()));
                }
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(method), Some(path)) = (positional.next(), positional.next()) else {
            bail!("METHOD and PATH are required\n{USAGE}");
        };
        let method = parse_method(&method)?;
        let body = positional
            .next()
            .map(|raw| serde_json::from_str(&raw).context("JSON_BODY is not valid JSON"))
            .transpose()?;
        if let Some(extra) = positional.next() {
            bail!("unexpected argument {extra}\n{USAGE}");
        }
        if body.is_some() && method == Method::GET {
            bail!("GET takes --query parameters, not a JSON body");
        }

        Ok(Self {
            config,
            credentials,
            service,
            auth,
            method,
            path,
            query,
            body,
        })
    }

    /// Request payload: query pairs for GET, the JSON body otherwise.
    pub fn payload(&self) -> Payload {
        if self.method == Method::GET {
            return Payload::Query(self.query.clone());
        }
        match &self.body {
            Some(body) => Payload::Json(body.clone()),
            None => Payload::Empty,
        }
    }
}

fn parse_method(raw: &str) -> Result<Method> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => bail!("unsupported method {other}, expected GET, POST, PUT, PATCH or DELETE"),
    }
}
