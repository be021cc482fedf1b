// ── Poller ──
//
// Runs the two-phase protocol for every configured endpoint: await the
// top-level listing, fan out one request per object link, then drain the
// fan-out before moving on. Endpoints are handled one at a time; requests
// within an endpoint run concurrently.
//
// A fan-out that ends without every handler running (cycle abandoned, or a
// handler task panicked) releases its remaining correlation entries, so the
// store never outlives the cycle that filled it.

use std::sync::Arc;
use std::time::Instant;

use linkpoll_api::{HttpClient, Transport};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::codec::Codec;
use crate::config::{NamedEndpoint, PollerConfig};
use crate::correlation::{CorrelationStore, RequestContext};
use crate::dispatcher::Dispatcher;
use crate::error::CoreError;
use crate::handler::{FailureHandler, ResponseHandler};
use crate::metadata::MetadataComposer;
use crate::model::Device;
use crate::sink::RecordSink;

/// Outcome of one endpoint's fetch and fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub devices: usize,
    pub dispatched: usize,
    /// The top-level listing could not be fetched or decoded.
    pub failed: bool,
}

/// Outcome of one full cycle over all endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub endpoints: usize,
    pub devices: usize,
    pub dispatched: usize,
    pub failed_endpoints: usize,
}

impl CycleSummary {
    fn add(&mut self, fetch: FetchSummary) {
        self.endpoints += 1;
        self.devices += fetch.devices;
        self.dispatched += fetch.dispatched;
        if fetch.failed {
            self.failed_endpoints += 1;
        }
    }
}

/// Owns the correlation store and everything that shares it.
pub struct Poller {
    endpoints: Vec<NamedEndpoint>,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    store: Arc<CorrelationStore>,
    dispatcher: Dispatcher,
    on_failure: Arc<FailureHandler>,
}

impl Poller {
    /// Build a poller with a reqwest transport from `config.transport`.
    pub fn new(config: &PollerConfig, sink: Arc<dyn RecordSink>) -> Result<Self, CoreError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpClient::new(&config.transport)?);
        let metadata = MetadataComposer::from_system(config.metadata_target.clone());
        Ok(Self::with_transport(config, transport, sink, metadata))
    }

    /// Build a poller around an existing transport and metadata composer.
    pub fn with_transport(
        config: &PollerConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn RecordSink>,
        metadata: MetadataComposer,
    ) -> Self {
        let store = Arc::new(CorrelationStore::new());
        let codec = config.codec.build();
        let metadata = Arc::new(metadata);

        let on_response = Arc::new(ResponseHandler::new(
            Arc::clone(&store),
            Arc::clone(&codec),
            Arc::clone(&sink),
            Arc::clone(&metadata),
            config.target.clone(),
        ));
        let on_failure = Arc::new(FailureHandler::new(Arc::clone(&store), sink, metadata));
        let dispatcher = Dispatcher::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            on_response,
            Arc::clone(&on_failure),
        );

        Self {
            endpoints: config.endpoints.clone(),
            transport,
            codec,
            store,
            dispatcher,
            on_failure,
        }
    }

    pub fn endpoints(&self) -> &[NamedEndpoint] {
        &self.endpoints
    }

    /// The correlation store shared with every in-flight request.
    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Poll every endpoint once, in order.
    pub async fn run_once(&self) -> CycleSummary {
        let started = Instant::now();
        let mut summary = CycleSummary::default();

        for endpoint in &self.endpoints {
            summary.add(self.fetch_devices(endpoint).await);
        }

        info!(
            endpoints = summary.endpoints,
            devices = summary.devices,
            dispatched = summary.dispatched,
            failed_endpoints = summary.failed_endpoints,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "poll cycle complete"
        );
        summary
    }

    /// Fetch one endpoint's listing, fan out, and drain.
    pub async fn fetch_devices(&self, endpoint: &NamedEndpoint) -> FetchSummary {
        let name = &endpoint.name;
        let request = &endpoint.request;
        let mut summary = FetchSummary::default();

        debug!(name = %name, url = %request.url, "fetching device listing");
        let started = Instant::now();
        let result = self.transport.execute(request).await;
        let elapsed = started.elapsed();

        let response = match result {
            Ok(response) if response.status.is_success() => response,
            Ok(response) => {
                let err = CoreError::UnexpectedStatus {
                    status: response.status,
                    url: request.url.clone(),
                };
                warn!(name = %name, error = %err, "device listing rejected");
                self.on_failure.on_failure(name, None, request, &err, elapsed);
                summary.failed = true;
                return summary;
            }
            Err(e) => {
                warn!(name = %name, error = %e, "device listing unreachable");
                self.on_failure.on_failure(name, None, request, &e, elapsed);
                summary.failed = true;
                return summary;
            }
        };

        let listing = match self.codec.decode(&response.body) {
            Ok(listing) => listing,
            Err(e) => {
                error!(
                    name = %name,
                    url = %request.url,
                    code = response.code(),
                    error = %e,
                    "failed to decode device listing"
                );
                summary.failed = true;
                return summary;
            }
        };

        // Declared before `tasks` so the set is aborted before entries are released.
        let mut in_flight = InFlight::new(name, &self.store);
        let mut tasks = JoinSet::new();
        for fields in listing {
            let device = match Device::from_fields(fields) {
                Ok(device) => device,
                Err(e) => {
                    warn!(name = %name, error = %e, "skipping malformed device entry");
                    continue;
                }
            };
            summary.devices += 1;

            for link in &device.object_links {
                match self
                    .dispatcher
                    .dispatch(name, &device, link, request, &mut tasks)
                {
                    Ok(context) => {
                        in_flight.contexts.push(context);
                        summary.dispatched += 1;
                    }
                    Err(e) => warn!(
                        name = %name,
                        endpoint = %device.endpoint,
                        link = %link.url,
                        error = %e,
                        "skipping object link"
                    ),
                }
            }
        }

        drain(name, &mut tasks).await;
        debug!(
            name = %name,
            devices = summary.devices,
            dispatched = summary.dispatched,
            "endpoint drained"
        );
        summary
    }
}

/// Contexts dispatched by one `fetch_devices` call. Whatever is still in
/// the store when this drops is released.
struct InFlight<'a> {
    name: &'a str,
    store: &'a CorrelationStore,
    contexts: Vec<RequestContext>,
}

impl<'a> InFlight<'a> {
    fn new(name: &'a str, store: &'a CorrelationStore) -> Self {
        Self {
            name,
            store,
            contexts: Vec::new(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let store = self.store;
        let released = self
            .contexts
            .drain(..)
            .filter(|context| store.take(*context).is_some())
            .count();
        if released > 0 {
            warn!(
                name = self.name,
                released,
                "released correlation entries of unfinished requests"
            );
        }
    }
}

/// Wait for every task in `tasks`. A panicking handler is logged, never
/// propagated.
async fn drain(name: &str, tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(name, error = %e, "object request task failed");
        }
    }
}
