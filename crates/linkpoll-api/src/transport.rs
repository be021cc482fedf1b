// Shared transport configuration for building reqwest::Client instances.
//
// Every endpoint of a poller goes through one client, so TLS, timeout,
// user-agent, and retry settings live here instead of on each request.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_USER_AGENT: &str = concat!("linkpoll/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout, applied unless a request overrides it.
    pub timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub user_agent: String,
    /// How many times a transient failure of an idempotent request is retried.
    pub automatic_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(60),
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: DEFAULT_USER_AGENT.into(),
            automatic_retries: 1,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str());

        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
