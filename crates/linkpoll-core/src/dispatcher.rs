// ── Fan-out dispatcher ──
//
// One call per (device, object link): derive the object URL, register the
// correlation entry, then spawn the request onto the caller's task set.
// Registration happens before the spawn so that a completion, however fast,
// always finds its entry.

use std::sync::Arc;
use std::time::Instant;

use linkpoll_api::{RequestSpec, Transport};
use tokio::task::JoinSet;
use tracing::debug;
use url::Url;

use crate::correlation::{CorrelationStore, RequestContext};
use crate::error::CoreError;
use crate::handler::{FailureHandler, ResponseHandler};
use crate::model::{CorrelationEntry, Device, ObjectLink};

/// Issues one asynchronous request per object link.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<CorrelationStore>,
    on_response: Arc<ResponseHandler>,
    on_failure: Arc<FailureHandler>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CorrelationStore>,
        on_response: Arc<ResponseHandler>,
        on_failure: Arc<FailureHandler>,
    ) -> Self {
        Self {
            transport,
            store,
            on_response,
            on_failure,
        }
    }

    /// Dispatch the sub-request for `link` of `device`.
    ///
    /// Returns the context the request was registered under. The request
    /// itself runs on `tasks`; the caller drains the set.
    pub fn dispatch(
        &self,
        name: &Arc<str>,
        device: &Device,
        link: &ObjectLink,
        base: &RequestSpec,
        tasks: &mut JoinSet<()>,
    ) -> Result<RequestContext, CoreError> {
        let url = object_url(&base.url, &device.endpoint, &link.url)?;
        let request = base.with_url(url);

        let context = self.store.register(CorrelationEntry::new(device, link));
        debug!(name = %name, %context, url = %request.url, "dispatching object request");

        let transport = Arc::clone(&self.transport);
        let on_response = Arc::clone(&self.on_response);
        let on_failure = Arc::clone(&self.on_failure);
        let name = Arc::clone(name);

        tasks.spawn(async move {
            let started = Instant::now();
            let result = transport.execute(&request).await;
            let elapsed = started.elapsed();
            match result {
                Ok(response) => {
                    on_response.on_success(&name, context, &request, &response, elapsed);
                }
                Err(e) => {
                    on_failure.on_failure(&name, Some(context), &request, &e, elapsed);
                }
            }
        });

        Ok(context)
    }
}

/// `base` + `/` + `endpoint` + `link`, appended as path segments.
///
/// The device endpoint is a single segment (a `/` inside it is escaped);
/// the link path contributes one segment per component. The base query
/// string is preserved and a trailing `/` on the base is not doubled.
pub fn object_url(base: &Url, endpoint: &str, link: &str) -> Result<Url, CoreError> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|()| CoreError::ObjectUrl {
            base: base.clone(),
            reason: "URL cannot carry a path".into(),
        })?;
        segments.pop_if_empty().push(endpoint);
        segments.extend(link.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url)
}
