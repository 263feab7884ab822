use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::args::{OutputFormat, TesterArgs};
use crate::config::TestConfiguration;
use crate::error::AppResult;
use crate::http::{HttpSender, RequestSender};
use crate::metrics::{self, compute_report};
use crate::shutdown::shutdown_channel;
use crate::shutdown_handlers::setup_signal_shutdown_handler;

use super::{progress, summary};

/// Presentation settings that do not affect the run itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunOptions {
    pub(crate) output_format: OutputFormat,
    pub(crate) show_progress: bool,
    pub(crate) no_color: bool,
}

impl RunOptions {
    pub(crate) const fn from_args(args: &TesterArgs) -> Self {
        Self {
            output_format: args.output_format,
            show_progress: !args.no_progress,
            no_color: args.no_color,
        }
    }
}

pub(crate) async fn run_local(config: &TestConfiguration, options: RunOptions) -> AppResult<()> {
    log_parameters(config);
    if !config.is_local_target() {
        warn!(
            "Target {} is not a local or private address; only load test hosts you are allowed to.",
            config.url()
        );
    }

    let sender: Arc<dyn RequestSender> = Arc::new(HttpSender::new(config)?);

    let (shutdown_tx, _) = shutdown_channel();
    let signal_shutdown_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let (progress_tx, progress_rx) = watch::channel(0_u64);
    let progress_handle = if options.show_progress {
        progress::setup_progress_indicator(
            config.requests(),
            Instant::now(),
            progress_rx,
            options.no_color,
        )
    } else {
        drop(progress_rx);
        tokio::spawn(async {})
    };

    let results = metrics::run_load_test(config, sender, &shutdown_tx, &progress_tx).await;

    drop(progress_tx);
    if let Err(err) = progress_handle.await {
        warn!("Progress indicator task failed: {}", err);
    }
    drop(shutdown_tx.send(()));
    if let Err(err) = signal_shutdown_handle.await {
        warn!("Signal handler task failed: {}", err);
    }

    let report = compute_report(&results);
    info!(
        "Run finished in {:.2}s: {} of {} requests recorded, {} succeeded{}",
        report.duration_secs,
        report.total_requests,
        report.requested,
        report.successful_requests,
        if report.interrupted { " (interrupted)" } else { "" }
    );

    summary::print_report(&report, options.output_format)
}

fn log_parameters(config: &TestConfiguration) {
    info!("Target: {} {}", config.method().as_str(), config.url());
    info!(
        "Requests: {}, concurrency: {}, rate: {} req/s ({} pacing)",
        config.requests(),
        config.concurrency(),
        config.rate(),
        config.pacing().as_str()
    );
    info!(
        "Timeouts: connect {:?}, request {:?}, drain {:?}",
        config.connect_timeout(),
        config.request_timeout(),
        config.drain_timeout()
    );
    if config.body().is_some() {
        info!("Payload: attached");
    }
    if !config.headers().is_empty() {
        info!("Headers: {}", config.headers().len());
    }
}
