use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::metrics::RequestOutcome;

use super::{ConcurrencyLimiter, RateSchedule, RequestSender};

/// Shared state every request task needs: the sender, the pacing schedule,
/// the in-flight limiter and the instant the run started.
pub struct Dispatcher {
    sender: Arc<dyn RequestSender>,
    schedule: RateSchedule,
    limiter: ConcurrencyLimiter,
    run_start: Instant,
}

impl Dispatcher {
    /// Starts the run clock now.
    #[must_use]
    pub fn new(
        sender: Arc<dyn RequestSender>,
        schedule: RateSchedule,
        limiter: ConcurrencyLimiter,
    ) -> Self {
        Self {
            sender,
            schedule,
            limiter,
            run_start: Instant::now(),
        }
    }

    #[must_use]
    pub const fn run_start(&self) -> Instant {
        self.run_start
    }

    #[must_use]
    pub const fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Runs the request at `index`: waits for its release offset, takes an
    /// in-flight slot, sends, and reports the outcome.
    ///
    /// Returns `None` when the stop flag is raised or the limiter is closed
    /// before the request was sent. Once sent, an outcome is always produced;
    /// transport failures become outcomes with an error kind.
    pub async fn dispatch(
        &self,
        index: u64,
        mut stop_rx: watch::Receiver<bool>,
    ) -> Option<RequestOutcome> {
        let delay = self.schedule.dispatch_delay(index);
        if let Some(release_at) = self.run_start.checked_add(delay) {
            tokio::select! {
                biased;
                () = stopped(&mut stop_rx) => return None,
                () = sleep_until(release_at) => {}
            }
        }

        let permit = tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => return None,
            permit = self.limiter.acquire() => permit?,
        };

        let started = Instant::now();
        let outcome = match self.sender.send(index).await {
            Ok(response) => {
                RequestOutcome::response(response.status, started.elapsed(), response.body_bytes)
            }
            Err(kind) => {
                debug!("Request {} failed: {}", index, kind);
                RequestOutcome::failure(kind, started.elapsed())
            }
        };
        drop(permit);
        Some(outcome)
    }
}

/// Resolves once the stop flag is raised. A dropped flag sender never stops.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    if stop_rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
