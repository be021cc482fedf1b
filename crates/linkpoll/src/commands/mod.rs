//! Command handlers.

pub mod check;
pub mod run;

use linkpoll_config::load_poller_config;
use linkpoll_core::PollerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load and validate configuration from `--config` (or the default path).
pub fn load(global: &GlobalOpts) -> Result<PollerConfig, CliError> {
    Ok(load_poller_config(global.config.as_deref())?)
}
