// Canonical request descriptor
//
// A `RequestSpec` is what every configured endpoint normalizes into and what
// every fanned-out sub-request is derived from. It is immutable once built;
// derived requests are produced with `with_url`.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use url::Url;

use crate::error::Error;

/// Placeholder written in place of credentials in structured requests.
pub const REDACTED: &str = "[REDACTED]";

/// HTTP basic-auth credentials.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub user: String,
    pub password: SecretString,
}

impl PartialEq for BasicAuth {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl Eq for BasicAuth {}

/// Transport options carried alongside method and URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub auth: Option<BasicAuth>,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Per-request timeout overriding the client default.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Encode the configured headers, rejecting names or values that
    /// cannot be sent on the wire.
    pub fn header_map(&self) -> Result<HeaderMap, Error> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

/// A validated, immutable request descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub options: RequestOptions,
}

impl RequestSpec {
    pub fn new(method: Method, url: Url, options: RequestOptions) -> Self {
        Self {
            method,
            url,
            options,
        }
    }

    /// A bare `GET` with no options.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, RequestOptions::default())
    }

    /// Derive a request for another URL, keeping method and options.
    pub fn with_url(&self, url: Url) -> Self {
        Self {
            method: self.method.clone(),
            url,
            options: self.options.clone(),
        }
    }

    /// Flatten options, method, and URL into one string-keyed mapping.
    ///
    /// This is the shape that appears in record metadata and failure
    /// records. Passwords never leave the process: auth renders as
    /// `{ "user": ..., "password": "[REDACTED]" }`.
    pub fn to_structured(&self) -> Map<String, Value> {
        let mut map = Map::new();

        if let Some(ref auth) = self.options.auth {
            map.insert(
                "auth".into(),
                json!({ "user": auth.user, "password": REDACTED }),
            );
        }
        if !self.options.headers.is_empty() {
            map.insert("headers".into(), json!(self.options.headers));
        }
        if !self.options.query.is_empty() {
            map.insert("query".into(), json!(self.options.query));
        }
        if let Some(ref body) = self.options.body {
            map.insert("body".into(), Value::String(body.clone()));
        }
        if let Some(timeout) = self.options.timeout {
            map.insert("timeout".into(), json!(timeout.as_secs_f64()));
        }

        map.insert("method".into(), Value::String(self.method.as_str().to_owned()));
        map.insert("url".into(), Value::String(self.url.as_str().to_owned()));
        map
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn structured_plain_get() {
        let spec = RequestSpec::get(url("http://host/api/clients"));
        let structured = spec.to_structured();
        assert_eq!(
            Value::Object(structured),
            json!({ "method": "GET", "url": "http://host/api/clients" })
        );
    }

    #[test]
    fn structured_redacts_password_and_flattens_options() {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_owned(), "application/json".to_owned());
        let spec = RequestSpec::new(
            Method::POST,
            url("https://host/api"),
            RequestOptions {
                auth: Some(BasicAuth {
                    user: "admin".into(),
                    password: SecretString::from("hunter2".to_owned()),
                }),
                headers,
                timeout: Some(Duration::from_millis(1500)),
                ..RequestOptions::default()
            },
        );

        let structured = Value::Object(spec.to_structured());
        assert_eq!(
            structured,
            json!({
                "auth": { "user": "admin", "password": "[REDACTED]" },
                "headers": { "Accept": "application/json" },
                "timeout": 1.5,
                "method": "POST",
                "url": "https://host/api",
            })
        );
        assert!(!structured.to_string().contains("hunter2"));
    }

    #[test]
    fn with_url_keeps_method_and_options() {
        let base = RequestSpec::new(
            Method::GET,
            url("http://host/api/clients"),
            RequestOptions {
                auth: Some(BasicAuth {
                    user: "a".into(),
                    password: SecretString::from("b".to_owned()),
                }),
                ..RequestOptions::default()
            },
        );
        let derived = base.with_url(url("http://host/api/clients/dev1/3/0"));
        assert_eq!(derived.method, Method::GET);
        assert_eq!(derived.options, base.options);
        assert_eq!(derived.url.path(), "/api/clients/dev1/3/0");
    }

    #[test]
    fn header_map_rejects_invalid_names() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_owned(), "x".to_owned());
        let options = RequestOptions {
            headers,
            ..RequestOptions::default()
        };
        assert!(matches!(
            options.header_map(),
            Err(Error::InvalidHeader { ref name, .. }) if name == "bad header"
        ));
    }
}
