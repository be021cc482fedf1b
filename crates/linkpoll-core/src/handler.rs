// ── Completion handlers ──
//
// Each dispatched request ends in exactly one of these. Both handlers wrap
// a fallible inner body and log its error at the boundary, so nothing they
// do can abort the poll cycle.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use linkpoll_api::{HttpResponse, RequestSpec};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::codec::{Codec, Fields};
use crate::correlation::{CorrelationStore, RequestContext};
use crate::error::CoreError;
use crate::metadata::{MetadataComposer, runtime_seconds};
use crate::model::{FAILURE_FIELD, FAILURE_TAG, Record};
use crate::sink::RecordSink;

// ── ResponseHandler ──────────────────────────────────────────────

/// Turns a successful sub-response into enriched records.
pub struct ResponseHandler {
    store: Arc<CorrelationStore>,
    codec: Arc<dyn Codec>,
    sink: Arc<dyn RecordSink>,
    metadata: Arc<MetadataComposer>,
    target: Option<String>,
}

impl ResponseHandler {
    pub fn new(
        store: Arc<CorrelationStore>,
        codec: Arc<dyn Codec>,
        sink: Arc<dyn RecordSink>,
        metadata: Arc<MetadataComposer>,
        target: Option<String>,
    ) -> Self {
        Self {
            store,
            codec,
            sink,
            metadata,
            target,
        }
    }

    /// Handle a completed sub-request. Errors are logged and the affected
    /// records dropped.
    pub fn on_success(
        &self,
        name: &str,
        context: RequestContext,
        request: &RequestSpec,
        response: &HttpResponse,
        elapsed: Duration,
    ) {
        match self.handle(name, context, request, response, elapsed) {
            Ok(emitted) => debug!(
                name,
                url = %request.url,
                code = response.code(),
                emitted,
                "response processed"
            ),
            Err(e) => error!(
                name,
                %context,
                request = %serde_json::Value::Object(request.to_structured()),
                code = response.code(),
                body_len = response.body.len(),
                error = %e,
                "failed to process response, record dropped"
            ),
        }
    }

    fn handle(
        &self,
        name: &str,
        context: RequestContext,
        request: &RequestSpec,
        response: &HttpResponse,
        elapsed: Duration,
    ) -> Result<usize, CoreError> {
        let entry = self
            .store
            .take(context)
            .ok_or(CoreError::MissingCorrelation { context })?;

        let decoded = self.codec.decode(&response.body)?;
        let mut emitted = 0;
        for fields in decoded {
            let mut record = self.wrap(fields);
            self.metadata
                .apply(&mut record, name, request, Some(response), Some(elapsed));
            entry.merge_into(&mut record);
            self.sink.emit(record)?;
            emitted += 1;
        }
        Ok(emitted)
    }

    fn wrap(&self, fields: Fields) -> Record {
        let Some(ref target) = self.target else {
            return Record::from(fields);
        };
        let mut record = Record::new();
        record.insert(target.clone(), Value::Object(fields));
        record
    }
}

// ── FailureHandler ───────────────────────────────────────────────

/// Synthesizes tagged failure records for requests that never produced a
/// usable response.
pub struct FailureHandler {
    store: Arc<CorrelationStore>,
    sink: Arc<dyn RecordSink>,
    metadata: Arc<MetadataComposer>,
}

impl FailureHandler {
    pub fn new(
        store: Arc<CorrelationStore>,
        sink: Arc<dyn RecordSink>,
        metadata: Arc<MetadataComposer>,
    ) -> Self {
        Self {
            store,
            sink,
            metadata,
        }
    }

    /// Handle a failed request. `context` is `None` for top-level fetches,
    /// which never register a correlation entry.
    pub fn on_failure(
        &self,
        name: &str,
        context: Option<RequestContext>,
        request: &RequestSpec,
        err: &(dyn StdError + 'static),
        elapsed: Duration,
    ) {
        if let Some(context) = context {
            self.store.take(context);
        }

        if let Err(e) = self.handle(name, request, err, elapsed) {
            error!(
                name,
                url = %request.url,
                original_error = %err,
                error = %e,
                "failed to emit failure record, dropped"
            );
        }
    }

    fn handle(
        &self,
        name: &str,
        request: &RequestSpec,
        err: &(dyn StdError + 'static),
        elapsed: Duration,
    ) -> Result<(), CoreError> {
        let mut record = Record::new();
        self.metadata
            .apply(&mut record, name, request, None, Some(elapsed));
        record.tag(FAILURE_TAG);

        let mut failure = Map::new();
        failure.insert("request".into(), Value::Object(request.to_structured()));
        failure.insert("name".into(), Value::String(name.to_owned()));
        failure.insert("error".into(), Value::String(err.to_string()));
        failure.insert("backtrace".into(), Value::Array(source_chain(err)));
        failure.insert("runtime_seconds".into(), runtime_seconds(Some(elapsed)));
        record.insert(FAILURE_FIELD, Value::Object(failure));

        self.sink.emit(record)
    }
}

/// The error and its sources, outermost first.
fn source_chain(err: &(dyn StdError + 'static)) -> Vec<Value> {
    let mut chain = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        chain.push(Value::String(e.to_string()));
        current = e.source();
    }
    chain
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use linkpoll_api::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::codec::JsonCodec;
    use crate::model::{CorrelationEntry, TAGS_FIELD};
    use crate::sink::{ChannelSink, drain_records};

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn emit(&self, _record: Record) -> Result<(), CoreError> {
            Err(CoreError::emit("sink unavailable"))
        }
    }

    fn request() -> RequestSpec {
        RequestSpec::get(Url::parse("http://host/api/clients/dev1/3/0").unwrap())
    }

    fn entry() -> CorrelationEntry {
        CorrelationEntry {
            endpoint: "dev1".into(),
            registration_id: json!("r1"),
            registration_date: json!("2024-01-01"),
            address: json!("1.2.3.4"),
            object_id: json!("3"),
            object_instance_id: json!("0"),
        }
    }

    fn handlers(
        metadata_target: Option<&str>,
        target: Option<&str>,
        sink: Arc<dyn RecordSink>,
    ) -> (Arc<CorrelationStore>, ResponseHandler, FailureHandler) {
        let store = Arc::new(CorrelationStore::new());
        let metadata = Arc::new(MetadataComposer::new(
            "poller-1",
            metadata_target.map(str::to_owned),
        ));
        let response = ResponseHandler::new(
            Arc::clone(&store),
            Arc::new(JsonCodec),
            Arc::clone(&sink),
            Arc::clone(&metadata),
            target.map(str::to_owned),
        );
        let failure = FailureHandler::new(Arc::clone(&store), sink, metadata);
        (store, response, failure)
    }

    #[test]
    fn success_merges_correlation_and_consumes_entry() {
        let (sink, mut rx) = ChannelSink::new();
        let (store, handler, _) = handlers(None, None, Arc::new(sink));
        let ctx = store.register(entry());

        let response = HttpResponse::new(StatusCode::OK, r#"{"value":42,"objectId":"spoofed"}"#);
        handler.on_success("test1", ctx, &request(), &response, Duration::from_millis(5));

        let records = drain_records(&mut rx);
        assert_eq!(records.len(), 1);
        assert_eq!(
            serde_json::to_value(&records[0]).unwrap(),
            json!({
                "value": 42,
                "endpoint": "dev1",
                "registrationId": "r1",
                "registrationDate": "2024-01-01",
                "address": "1.2.3.4",
                "objectId": "3",
                "objectInstanceId": "0",
            })
        );
        assert!(!store.contains(ctx));
    }

    #[test]
    fn success_nests_payload_under_target() {
        let (sink, mut rx) = ChannelSink::new();
        let (store, handler, _) = handlers(Some("meta"), Some("payload"), Arc::new(sink));
        let ctx = store.register(entry());

        let response = HttpResponse::new(StatusCode::OK, r#"{"value":42}"#);
        handler.on_success("test1", ctx, &request(), &response, Duration::from_millis(5));

        let record = drain_records(&mut rx).pop().unwrap();
        assert_eq!(record.pointer("payload.value"), Some(&json!(42)));
        assert_eq!(record.get("value"), None);
        assert_eq!(record.get("endpoint"), Some(&json!("dev1")));
        assert_eq!(record.pointer("meta.code"), Some(&json!(200)));
        assert_eq!(record.pointer("meta.response_message"), Some(&json!("OK")));
        assert_eq!(
            record.pointer("meta.request.url"),
            Some(&json!("http://host/api/clients/dev1/3/0"))
        );
    }

    #[test]
    fn success_without_correlation_entry_is_dropped() {
        let (sink, mut rx) = ChannelSink::new();
        let (_, handler, _) = handlers(None, None, Arc::new(sink));

        let response = HttpResponse::new(StatusCode::OK, r#"{"value":42}"#);
        handler.on_success("test1", RequestContext::new(), &request(), &response, Duration::ZERO);

        assert!(drain_records(&mut rx).is_empty());
    }

    #[test]
    fn undecodable_body_is_dropped_and_entry_consumed() {
        let (sink, mut rx) = ChannelSink::new();
        let (store, handler, _) = handlers(None, None, Arc::new(sink));
        let ctx = store.register(entry());

        let response = HttpResponse::new(StatusCode::OK, "<html>not json</html>");
        handler.on_success("test1", ctx, &request(), &response, Duration::ZERO);

        assert!(drain_records(&mut rx).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn rejected_emit_still_consumes_entry() {
        let (store, handler, _) = handlers(Some("meta"), None, Arc::new(FailingSink));
        let ctx = store.register(entry());

        let response = HttpResponse::new(StatusCode::OK, r#"{"value":42}"#);
        handler.on_success("test1", ctx, &request(), &response, Duration::from_millis(5));

        assert!(store.is_empty());
    }

    #[test]
    fn failure_record_shape() {
        let (sink, mut rx) = ChannelSink::new();
        let (store, _, handler) = handlers(Some("meta"), None, Arc::new(sink));
        let ctx = store.register(entry());

        let err = linkpoll_api::Error::Connection {
            message: "connection reset".into(),
        };
        handler.on_failure("test1", Some(ctx), &request(), &err, Duration::from_millis(420));

        let record = drain_records(&mut rx).pop().unwrap();
        assert!(record.has_tag(FAILURE_TAG));
        assert_eq!(record.get(TAGS_FIELD), Some(&json!(["_http_request_failure"])));
        assert_eq!(
            record.get(FAILURE_FIELD),
            Some(&json!({
                "request": { "method": "GET", "url": "http://host/api/clients/dev1/3/0" },
                "name": "test1",
                "error": "connection reset",
                "backtrace": ["connection reset"],
                "runtime_seconds": 0.42,
            }))
        );
        assert_eq!(record.pointer("meta.name"), Some(&json!("test1")));
        assert_eq!(record.pointer("meta.runtime_seconds"), Some(&json!(0.42)));
        assert_eq!(record.pointer("meta.code"), None);
        assert_eq!(record.get("endpoint"), None);
        assert!(store.is_empty(), "failure must release its correlation entry");
    }

    #[test]
    fn failure_backtrace_walks_sources() {
        let (sink, mut rx) = ChannelSink::new();
        let (_, _, handler) = handlers(None, None, Arc::new(sink));

        let err = CoreError::Transport(linkpoll_api::Error::Timeout {
            timeout: Duration::from_secs(5).into(),
        });
        handler.on_failure("test1", None, &request(), &err, Duration::from_secs(5));

        let record = drain_records(&mut rx).pop().unwrap();
        assert_eq!(
            record.pointer("http_request_failure.backtrace"),
            Some(&json!(["Request timed out after 5s"]))
        );
    }

    #[test]
    fn double_fault_is_swallowed() {
        let (store, _, handler) = handlers(Some("meta"), None, Arc::new(FailingSink));
        let ctx = store.register(entry());

        let err = linkpoll_api::Error::Connection {
            message: "connection reset".into(),
        };
        handler.on_failure("test1", Some(ctx), &request(), &err, Duration::ZERO);

        assert!(store.is_empty());
    }
}
