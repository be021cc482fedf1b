// ── Request/response metadata ──
//
// Every emitted record can carry a metadata object describing the request
// that produced it. The host name is resolved once when the composer is
// built, not per record.

use std::time::Duration;

use linkpoll_api::{HttpResponse, RequestSpec};
use serde_json::{Map, Value, json};

use crate::model::Record;

/// Default metadata field: hidden by convention from downstream outputs.
pub const DEFAULT_METADATA_TARGET: &str = "@metadata";

/// Builds and attaches the metadata substructure.
#[derive(Debug, Clone)]
pub struct MetadataComposer {
    host: String,
    target: Option<String>,
}

impl MetadataComposer {
    /// `target` of `None` disables metadata entirely.
    pub fn new(host: impl Into<String>, target: Option<String>) -> Self {
        Self {
            host: host.into(),
            target,
        }
    }

    /// Resolve the local host name and build a composer for `target`.
    pub fn from_system(target: Option<String>) -> Self {
        Self::new(local_hostname(), target)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Build the metadata object. Response fields appear only when a
    /// response is given.
    pub fn compose(
        &self,
        name: &str,
        request: &RequestSpec,
        response: Option<&HttpResponse>,
        elapsed: Option<Duration>,
    ) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("name".into(), Value::String(name.to_owned()));
        meta.insert("host".into(), Value::String(self.host.clone()));
        meta.insert("request".into(), Value::Object(request.to_structured()));
        meta.insert("runtime_seconds".into(), runtime_seconds(elapsed));

        if let Some(response) = response {
            meta.insert("code".into(), json!(response.code()));
            meta.insert("response_headers".into(), json!(response.headers));
            meta.insert("response_message".into(), json!(response.message()));
            meta.insert("times_retried".into(), json!(response.times_retried));
        }
        meta
    }

    /// Attach metadata to `record` under the configured target, if any.
    pub fn apply(
        &self,
        record: &mut Record,
        name: &str,
        request: &RequestSpec,
        response: Option<&HttpResponse>,
        elapsed: Option<Duration>,
    ) {
        if let Some(ref target) = self.target {
            let meta = self.compose(name, request, response, elapsed);
            record.insert(target.clone(), Value::Object(meta));
        }
    }
}

pub(crate) fn runtime_seconds(elapsed: Option<Duration>) -> Value {
    elapsed.map_or(Value::Null, |d| json!(d.as_secs_f64()))
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use linkpoll_api::StatusCode;
    use pretty_assertions::assert_eq;
    use url::Url;

    use super::*;

    fn request() -> RequestSpec {
        RequestSpec::get(Url::parse("http://host/api/clients/dev1/3/0").unwrap())
    }

    #[test]
    fn compose_without_response() {
        let composer = MetadataComposer::new("poller-1", Some("meta".into()));
        let meta = composer.compose("test1", &request(), None, Some(Duration::from_millis(250)));

        assert_eq!(
            Value::Object(meta),
            json!({
                "name": "test1",
                "host": "poller-1",
                "request": { "method": "GET", "url": "http://host/api/clients/dev1/3/0" },
                "runtime_seconds": 0.25,
            })
        );
    }

    #[test]
    fn compose_with_response_adds_response_fields() {
        let composer = MetadataComposer::new("poller-1", Some("meta".into()));
        let mut response = HttpResponse::new(StatusCode::OK, "{}")
            .with_header("content-type", "application/json");
        response.times_retried = 1;

        let meta = composer.compose("test1", &request(), Some(&response), None);

        assert_eq!(meta.get("code"), Some(&json!(200)));
        assert_eq!(meta.get("response_message"), Some(&json!("OK")));
        assert_eq!(meta.get("times_retried"), Some(&json!(1)));
        assert_eq!(
            meta.get("response_headers"),
            Some(&json!({ "content-type": "application/json" }))
        );
        assert_eq!(meta.get("runtime_seconds"), Some(&Value::Null));
    }

    #[test]
    fn apply_respects_disabled_target() {
        let mut record = Record::new();
        MetadataComposer::new("h", None).apply(&mut record, "n", &request(), None, None);
        assert!(record.fields().is_empty());

        MetadataComposer::new("h", Some("meta".into())).apply(&mut record, "n", &request(), None, None);
        assert_eq!(record.pointer("meta.name"), Some(&json!("n")));
        assert_eq!(record.pointer("meta.host"), Some(&json!("h")));
    }

    #[test]
    fn system_host_is_never_empty() {
        let composer = MetadataComposer::from_system(None);
        assert!(!composer.host().is_empty());
        assert_eq!(composer.target(), None);
    }
}
