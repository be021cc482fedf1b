// HTTP client and transport seam
//
// `HttpClient` executes `RequestSpec`s over reqwest and captures everything
// the record layer needs from a response (status, headers, body, retries).
// The `Transport` trait is the seam the poller dispatches through, so tests
// can substitute in-process transports.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::error::Error;
use crate::request::RequestSpec;
use crate::transport::TransportConfig;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Response headers; repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// How many times the request was retried before this response arrived.
    pub times_retried: u32,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            times_retried: 0,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    /// The canonical reason phrase for the status, e.g. `"OK"`.
    pub fn message(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }
}

/// Anything that can execute a `RequestSpec` asynchronously.
pub trait Transport: Send + Sync {
    fn execute<'a>(&'a self, request: &'a RequestSpec) -> BoxFuture<'a, Result<HttpResponse, Error>>;
}

/// reqwest-backed transport with bounded automatic retries.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    default_timeout: Duration,
    automatic_retries: u32,
}

impl HttpClient {
    /// Build a client from a `TransportConfig`.
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            default_timeout: config.timeout,
            automatic_retries: config.automatic_retries,
        })
    }

    /// Wrap a pre-built `reqwest::Client`. Retries are disabled.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            default_timeout: TransportConfig::default().timeout,
            automatic_retries: 0,
        }
    }

    /// Send a request, retrying transient failures of idempotent methods.
    pub async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, Error> {
        let mut attempt = 0;
        loop {
            debug!(method = %request.method, url = %request.url, attempt, "sending request");

            match self.send_once(request).await {
                Ok(mut response) => {
                    response.times_retried = attempt;
                    return Ok(response);
                }
                Err(e)
                    if attempt < self.automatic_retries
                        && e.is_transient()
                        && request.method.is_idempotent() =>
                {
                    attempt += 1;
                    warn!(url = %request.url, attempt, error = %e, "retrying request");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &RequestSpec) -> Result<HttpResponse, Error> {
        let options = &request.options;
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(options.header_map()?);

        if let Some(ref auth) = options.auth {
            builder = builder.basic_auth(&auth.user, Some(auth.password.expose_secret()));
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(ref body) = options.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let resp = builder
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = resp.status();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in resp.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_owned())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        let body = resp.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            times_retried: 0,
        })
    }
}

impl Transport for HttpClient {
    fn execute<'a>(&'a self, request: &'a RequestSpec) -> BoxFuture<'a, Result<HttpResponse, Error>> {
        self.send(request).boxed()
    }
}

/// Map a reqwest error onto the crate's error taxonomy.
fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout: timeout.into(),
        }
    } else if err.is_connect() {
        Error::Connection {
            message: root_cause(&err),
        }
    } else {
        Error::Transport(err)
    }
}

fn root_cause(err: &reqwest::Error) -> String {
    let mut cause: &dyn std::error::Error = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_message_is_canonical_reason() {
        let resp = HttpResponse::new(StatusCode::NOT_FOUND, "missing");
        assert_eq!(resp.code(), 404);
        assert_eq!(resp.message(), "Not Found");
        assert_eq!(resp.times_retried, 0);
    }
}
