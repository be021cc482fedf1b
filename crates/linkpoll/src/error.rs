//! CLI error types with miette diagnostics.
//!
//! Maps config and startup failures into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use linkpoll_config::ConfigError;
use linkpoll_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    /// Argument errors; clap exits with this itself.
    #[allow(dead_code)]
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(linkpoll::no_config),
        help("Pass an existing file with --config or set LINKPOLL_CONFIG.")
    )]
    NoConfig { path: String },

    #[error("No endpoints configured")]
    #[diagnostic(
        code(linkpoll::no_endpoints),
        help(
            "Add at least one endpoint to the config file, e.g.\n\n\
             [urls]\n\
             clients = \"http://localhost:8080/api/clients\""
        )
    )]
    NoEndpoints,

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(linkpoll::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(linkpoll::config),
        help("Check the TOML syntax and any LINKPOLL_* environment variables.")
    )]
    Config(Box<figment::Error>),

    // ── Startup ──────────────────────────────────────────────────────
    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(linkpoll::tls),
        help("Check transport.ca_cert points at a readable PEM certificate.")
    )]
    Tls { reason: String },

    #[error(transparent)]
    #[diagnostic(code(linkpoll::core))]
    Core(CoreError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. }
            | Self::NoEndpoints
            | Self::Validation { .. }
            | Self::Config(_)
            | Self::Tls { .. } => exit_code::CONFIG,
            Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError / CoreError → CliError mapping ───────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoEndpoints => Self::NoEndpoints,
            ConfigError::Missing { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Io(err) => Self::Io(err),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport(linkpoll_api::Error::Tls(reason)) => Self::Tls { reason },
            other => Self::Core(other),
        }
    }
}
