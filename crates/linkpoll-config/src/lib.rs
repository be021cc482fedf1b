//! Configuration for linkpoll.
//!
//! A TOML file, `LINKPOLL_`-prefixed environment variables, and built-in
//! defaults are layered with figment into a [`Config`], which is then
//! validated into a `linkpoll_core::PollerConfig`. Every endpoint is
//! normalized at load time; any invalid entry fails the whole load.

mod normalize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use linkpoll_api::{DEFAULT_USER_AGENT, TlsMode, TransportConfig};
use linkpoll_core::{CodecKind, DEFAULT_METADATA_TARGET, NamedEndpoint, PollerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use normalize::{AuthInput, DetailedSpec, RequestSpecInput, normalize_request};

use normalize::positive_duration;

/// Environment variable prefix. Nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "LINKPOLL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no endpoints configured under [urls]")]
    NoEndpoints,

    #[error("config file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Time between poll cycles.
    #[serde(default)]
    pub interval: IntervalSpec,

    /// Field to nest decoded payloads under.
    pub target: Option<String>,

    /// Field to attach metadata under. Empty disables metadata.
    #[serde(default = "default_metadata_target")]
    pub metadata_target: String,

    #[serde(default)]
    pub codec: CodecKind,

    #[serde(default)]
    pub transport: TransportSettings,

    /// Named endpoints, polled in name order.
    #[serde(default)]
    pub urls: BTreeMap<String, RequestSpecInput>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: IntervalSpec::default(),
            target: None,
            metadata_target: default_metadata_target(),
            codec: CodecKind::default(),
            transport: TransportSettings::default(),
            urls: BTreeMap::new(),
        }
    }
}

fn default_metadata_target() -> String {
    DEFAULT_METADATA_TARGET.into()
}

/// `interval = 30` (seconds) or `interval = "1m 30s"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IntervalSpec {
    Seconds(f64),
    Human(String),
}

impl Default for IntervalSpec {
    fn default() -> Self {
        Self::Seconds(60.0)
    }
}

impl IntervalSpec {
    pub fn to_duration(&self) -> Result<Duration, ConfigError> {
        let duration = match self {
            Self::Seconds(secs) => positive_duration(*secs),
            Self::Human(text) => humantime::parse_duration(text.trim())
                .ok()
                .filter(|d| !d.is_zero()),
        };
        duration.ok_or_else(|| ConfigError::Validation {
            field: "interval".into(),
            reason: format!("expected a positive duration, got {self}"),
        })
    }
}

impl std::fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds(secs) => write!(f, "{secs}"),
            Self::Human(text) => write!(f, "'{text}'"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Connect timeout in seconds.
    pub connect_timeout: Option<f64>,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a PEM CA certificate to trust.
    pub ca_cert: Option<PathBuf>,

    pub user_agent: Option<String>,

    /// Retries for transient failures of idempotent requests.
    #[serde(default = "default_retries")]
    pub automatic_retries: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: Some(10.0),
            insecure: false,
            ca_cert: None,
            user_agent: None,
            automatic_retries: default_retries(),
        }
    }
}

fn default_timeout() -> f64 {
    60.0
}
fn default_retries() -> u32 {
    1
}

impl TransportSettings {
    pub fn to_transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let timeout = positive_duration(self.timeout).ok_or_else(|| ConfigError::Validation {
            field: "transport.timeout".into(),
            reason: format!("expected a positive number of seconds, got {}", self.timeout),
        })?;
        let connect_timeout = self
            .connect_timeout
            .map(|secs| {
                positive_duration(secs).ok_or_else(|| ConfigError::Validation {
                    field: "transport.connect_timeout".into(),
                    reason: format!("expected a positive number of seconds, got {secs}"),
                })
            })
            .transpose()?;

        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        Ok(TransportConfig {
            tls,
            timeout,
            connect_timeout,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            automatic_retries: self.automatic_retries,
        })
    }
}

impl Config {
    /// Validate everything and build the runtime configuration.
    pub fn to_poller_config(&self) -> Result<PollerConfig, ConfigError> {
        if self.urls.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        let endpoints = self
            .urls
            .iter()
            .map(|(name, input)| {
                normalize_request(name, input).map(|spec| NamedEndpoint::new(name.as_str(), spec))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PollerConfig {
            endpoints,
            interval: self.interval.to_duration()?,
            target: non_empty(self.target.as_deref()),
            metadata_target: non_empty(Some(self.metadata_target.as_str())),
            codec: self.codec,
            transport: self.transport.to_transport_config()?,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "linkpoll", "linkpoll").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("linkpoll");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from defaults, file, and environment.
///
/// An explicit `path` must exist; the default path may be absent.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = if let Some(path) = path {
        if !path.try_exists()? {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        path.to_path_buf()
    } else {
        config_path()
    };

    let config: Config = figment(&path).extract()?;
    Ok(config)
}

/// Load and validate in one step.
pub fn load_poller_config(path: Option<&Path>) -> Result<PollerConfig, ConfigError> {
    load_config(path)?.to_poller_config()
}

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
}
