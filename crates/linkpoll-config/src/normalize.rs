// ── Endpoint normalization ──
//
// A configured endpoint is either a bare URL or a detailed table. Both
// shapes pass through `normalize_request`, which is the only way a
// `RequestSpec` gets built from configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use linkpoll_api::{BasicAuth, Method, RequestOptions, RequestSpec};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

/// Methods an endpoint may use.
const ALLOWED_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Raw `[urls]` entry, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestSpecInput {
    /// `name = "https://host/path"`
    Plain(String),
    /// `[urls.name]` with `url`, `method`, `auth`, ...
    Detailed(DetailedSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DetailedSpec {
    pub method: Option<String>,
    pub url: Option<String>,
    pub auth: Option<AuthInput>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, alias = "params", skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout: Option<f64>,
    /// Anything else. Must be empty.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuthInput {
    pub user: Option<String>,
    #[serde(alias = "pass")]
    pub password: Option<String>,
}

/// Validate one endpoint entry and turn it into a `RequestSpec`.
pub fn normalize_request(name: &str, input: &RequestSpecInput) -> Result<RequestSpec, ConfigError> {
    let detailed;
    let spec = match input {
        RequestSpecInput::Plain(url) => {
            detailed = DetailedSpec {
                url: Some(url.clone()),
                ..DetailedSpec::default()
            };
            &detailed
        }
        RequestSpecInput::Detailed(spec) => spec,
    };

    if let Some(key) = spec.extra.keys().next() {
        return Err(invalid(name, key, "unknown option"));
    }

    let method = parse_method(name, spec.method.as_deref())?;
    let url = parse_url(name, spec.url.as_deref())?;

    let auth = spec
        .auth
        .as_ref()
        .map(|auth| parse_auth(name, auth))
        .transpose()?;

    let timeout = spec
        .timeout
        .map(|secs| {
            positive_duration(secs)
                .ok_or_else(|| invalid(name, "timeout", "must be a positive number of seconds"))
        })
        .transpose()?;

    let options = RequestOptions {
        auth,
        headers: spec.headers.clone(),
        query: spec.query.clone(),
        body: spec.body.clone(),
        timeout,
    };
    options
        .header_map()
        .map_err(|e| invalid(name, "headers", &e.to_string()))?;

    Ok(RequestSpec::new(method, url, options))
}

fn parse_method(name: &str, method: Option<&str>) -> Result<Method, ConfigError> {
    let Some(method) = method else {
        return Ok(Method::GET);
    };
    let upper = method.to_ascii_uppercase();
    if !ALLOWED_METHODS.contains(&upper.as_str()) {
        return Err(invalid(
            name,
            "method",
            &format!("unsupported HTTP method '{method}'"),
        ));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|e| invalid(name, "method", &e.to_string()))
}

fn parse_url(name: &str, url: Option<&str>) -> Result<Url, ConfigError> {
    let raw = url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| invalid(name, "url", "missing"))?;
    let url = Url::parse(raw)
        .map_err(|e| invalid(name, "url", &format!("'{raw}' is not an absolute URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(
            name,
            "url",
            &format!("scheme '{other}' is not http or https"),
        )),
    }
}

fn parse_auth(name: &str, auth: &AuthInput) -> Result<BasicAuth, ConfigError> {
    let user = auth
        .user
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| invalid(name, "auth.user", "missing"))?;
    let password = auth
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| invalid(name, "auth.password", "missing"))?;
    Ok(BasicAuth {
        user: user.to_owned(),
        password: SecretString::from(password.to_owned()),
    })
}

pub(crate) fn positive_duration(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

fn invalid(name: &str, field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: format!("urls.{name}.{field}"),
        reason: reason.to_owned(),
    }
}
