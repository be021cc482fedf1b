// ── Poll scheduler ──
//
// Drives `Poller::run_once` on a fixed interval until cancelled. Cycles
// never overlap: a slow cycle pushes the next tick back instead of queueing
// a burst of catch-up ticks.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::poller::Poller;

/// Poll immediately, then every `interval`, until `cancel` fires.
///
/// Returns the number of completed cycles. A cycle in progress when
/// `cancel` fires is abandoned: its in-flight requests are aborted and
/// their correlation entries released.
pub async fn run_schedule(poller: &Poller, interval: Duration, cancel: CancellationToken) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = 0;

    info!(
        endpoints = poller.endpoints().len(),
        interval_secs = interval.as_secs_f64(),
        "poller started"
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("cancelled mid-cycle, abandoning in-flight requests");
                break;
            }
            _ = poller.run_once() => cycles += 1,
        }
    }

    info!(cycles, "poller stopped");
    cycles
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::FutureExt;
    use futures_util::future::BoxFuture;
    use linkpoll_api::{Error, HttpResponse, RequestSpec, StatusCode, Transport};
    use url::Url;

    use super::*;
    use crate::config::{NamedEndpoint, PollerConfig};
    use crate::metadata::MetadataComposer;
    use crate::sink::ChannelSink;

    /// Serves an empty listing and counts top-level fetches.
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    impl Transport for CountingTransport {
        fn execute<'a>(
            &'a self,
            _request: &'a RequestSpec,
        ) -> BoxFuture<'a, Result<HttpResponse, Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(HttpResponse::new(StatusCode::OK, "[]")) }.boxed()
        }
    }

    fn poller(transport: Arc<CountingTransport>) -> Poller {
        let url = Url::parse("http://host/api/clients").unwrap();
        let config = PollerConfig {
            endpoints: vec![NamedEndpoint::new("test1", RequestSpec::get(url))],
            ..PollerConfig::default()
        };
        let (sink, _rx) = ChannelSink::new();
        Poller::with_transport(&config, transport, Arc::new(sink), MetadataComposer::new("h", None))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_on_each_tick() {
        let transport = Arc::new(CountingTransport::default());
        let poller = poller(Arc::clone(&transport));
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                cancel.cancel();
            }
        };

        let (cycles, ()) = tokio::join!(
            run_schedule(&poller, Duration::from_secs(1), cancel.clone()),
            stopper
        );

        // Ticks at t=0, 1s, 2s.
        assert_eq!(cycles, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let transport = Arc::new(CountingTransport::default());
        let poller = poller(Arc::clone(&transport));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let cycles = run_schedule(&poller, Duration::from_secs(1), cancel).await;
        assert_eq!(cycles, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
