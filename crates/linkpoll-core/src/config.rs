// ── Runtime poller configuration ──
//
// These types describe *what* to poll and *how* to shape the records.
// They carry validated request specs and never touch disk: the config crate
// loads and normalizes files, then hands a `PollerConfig` in.

use std::sync::Arc;
use std::time::Duration;

use linkpoll_api::{RequestSpec, TransportConfig};

use crate::codec::CodecKind;
use crate::metadata::DEFAULT_METADATA_TARGET;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// A configured top-level endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEndpoint {
    pub name: Arc<str>,
    pub request: RequestSpec,
}

impl NamedEndpoint {
    pub fn new(name: impl Into<Arc<str>>, request: RequestSpec) -> Self {
        Self {
            name: name.into(),
            request,
        }
    }
}

/// Everything a `Poller` needs besides its sink.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Endpoints, polled in this order every cycle.
    pub endpoints: Vec<NamedEndpoint>,
    /// Time between cycle starts.
    pub interval: Duration,
    /// Field to nest decoded payloads under. `None` merges at the root.
    pub target: Option<String>,
    /// Field to attach metadata under. `None` disables metadata.
    pub metadata_target: Option<String>,
    pub codec: CodecKind,
    pub transport: TransportConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            interval: DEFAULT_INTERVAL,
            target: None,
            metadata_target: Some(DEFAULT_METADATA_TARGET.into()),
            codec: CodecKind::default(),
            transport: TransportConfig::default(),
        }
    }
}
