//! `linkpoll run`: poll until interrupted, or once with `--once`.

use std::sync::Arc;

use linkpoll_core::{Poller, run_schedule};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output::StdoutSink;

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load(global)?;
    let poller = Poller::new(&config, Arc::new(StdoutSink::new(args.pretty)))?;

    if args.once {
        let summary = poller.run_once().await;
        if summary.failed_endpoints > 0 {
            warn!(
                failed_endpoints = summary.failed_endpoints,
                "some endpoints could not be polled"
            );
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_interrupt(cancel.clone()));

    run_schedule(&poller, config.interval, cancel).await;
    Ok(())
}

async fn shutdown_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, shutting down");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "cannot listen for interrupts"),
    }
}
