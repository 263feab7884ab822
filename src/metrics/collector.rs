use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::TestConfiguration;
use crate::http::{ConcurrencyLimiter, Dispatcher, RateSchedule, RequestSender};
use crate::shutdown::ShutdownSender;

use super::{RequestOutcome, ResultSet};

/// Upper bound on the outcome buffer reserved ahead of time.
const MAX_PREALLOCATED_OUTCOMES: usize = 1 << 16;
const MAX_DRAIN_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs one load test end to end: schedules `requests` dispatches at the
/// configured rate, bounded by the configured concurrency, and gathers every
/// outcome.
pub async fn run_load_test(
    config: &TestConfiguration,
    sender: Arc<dyn RequestSender>,
    shutdown_tx: &ShutdownSender,
    progress_tx: &watch::Sender<u64>,
) -> ResultSet {
    let limiter = ConcurrencyLimiter::new(config.concurrency());
    let dispatcher = Arc::new(Dispatcher::new(
        sender,
        RateSchedule::from_config(config),
        limiter.clone(),
    ));

    let results = collect_outcomes(
        dispatcher,
        config.requests(),
        config.drain_timeout(),
        shutdown_tx,
        progress_tx,
    )
    .await;

    debug!(
        "Peak in-flight requests: {} of {} allowed",
        limiter.peak(),
        limiter.capacity()
    );
    results
}

/// Spawns one task per dispatch index and records outcomes in completion
/// order.
///
/// A task that panics or is cancelled before reporting still counts, as a
/// `TaskFailure` outcome. On shutdown, pending dispatches are withdrawn and
/// in-flight requests get `drain_timeout` to finish; whatever is still running
/// after that is abandoned and not counted.
pub async fn collect_outcomes(
    dispatcher: Arc<Dispatcher>,
    requests: u64,
    drain_timeout: Duration,
    shutdown_tx: &ShutdownSender,
    progress_tx: &watch::Sender<u64>,
) -> ResultSet {
    let drain_timeout = drain_timeout.min(MAX_DRAIN_TIMEOUT);
    let mut shutdown_rx = shutdown_tx.subscribe();
    let (stop_tx, stop_rx) = watch::channel(false);
    let run_start = dispatcher.run_start();

    let mut tasks = JoinSet::new();
    for index in 0..requests {
        let dispatcher = Arc::clone(&dispatcher);
        let stop_rx = stop_rx.clone();
        tasks.spawn(async move { dispatcher.dispatch(index, stop_rx).await });
    }
    drop(stop_rx);

    let capacity = usize::try_from(requests)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATED_OUTCOMES);
    let mut outcomes: Vec<RequestOutcome> = Vec::with_capacity(capacity);
    let mut interrupted = false;
    let mut shutdown_open = true;
    let drain_timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(drain_timer);

    loop {
        tokio::select! {
            biased;
            joined = tasks.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                match joined {
                    Ok(Some(outcome)) => outcomes.push(outcome),
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("Request task failed: {}", err);
                        outcomes.push(RequestOutcome::task_failure());
                    }
                }
                progress_tx.send_replace(u64::try_from(outcomes.len()).unwrap_or(u64::MAX));
            }
            signal = shutdown_rx.recv(), if shutdown_open && !interrupted => {
                if matches!(signal, Err(broadcast::error::RecvError::Closed)) {
                    shutdown_open = false;
                    continue;
                }
                interrupted = true;
                stop_tx.send_replace(true);
                dispatcher.limiter().close();
                warn!(
                    "Interrupted; waiting up to {:?} for {} in-flight requests",
                    drain_timeout,
                    dispatcher.limiter().in_flight()
                );
                drain_timer.as_mut().reset(Instant::now() + drain_timeout);
            }
            () = &mut drain_timer, if interrupted => {
                let abandoned = tasks.len();
                tasks.abort_all();
                warn!("Drain timeout elapsed; abandoning {} unfinished requests", abandoned);
                break;
            }
        }
    }

    ResultSet::new(outcomes, run_start.elapsed(), requests, interrupted)
}
