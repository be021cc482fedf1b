// linkpoll-core: fan-out/correlation engine for polling device listings

pub mod codec;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod metadata;
pub mod model;
pub mod poller;
pub mod scheduler;
pub mod sink;

// ── Primary re-exports ──────────────────────────────────────────────
pub use codec::{Codec, CodecKind, JsonCodec, JsonLinesCodec, PlainCodec};
pub use config::{DEFAULT_INTERVAL, NamedEndpoint, PollerConfig};
pub use correlation::{CorrelationStore, RequestContext};
pub use dispatcher::Dispatcher;
pub use error::CoreError;
pub use handler::{FailureHandler, ResponseHandler};
pub use metadata::{DEFAULT_METADATA_TARGET, MetadataComposer};
pub use model::{CorrelationEntry, Device, FAILURE_FIELD, FAILURE_TAG, ObjectLink, Record};
pub use poller::{CycleSummary, FetchSummary, Poller};
pub use scheduler::run_schedule;
pub use sink::{ChannelSink, RecordSink, drain_records};
