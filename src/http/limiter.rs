use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of requests in flight at once.
///
/// Backed by a fair semaphore, so waiters are served in arrival order and a
/// released slot always goes to the longest waiter.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    gauge: Arc<InFlightGauge>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        self.peak.fetch_max(now, Ordering::AcqRel);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Held for the duration of one request. Dropping it frees the slot.
#[derive(Debug)]
pub struct InFlightPermit {
    _permit: OwnedSemaphorePermit,
    gauge: Arc<InFlightGauge>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.gauge.leave();
    }
}

impl ConcurrencyLimiter {
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            gauge: Arc::new(InFlightGauge::default()),
            capacity,
        }
    }

    /// Waits for a free slot. Returns `None` once the limiter is closed.
    pub async fn acquire(&self) -> Option<InFlightPermit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        self.gauge.enter();
        Some(InFlightPermit {
            _permit: permit,
            gauge: Arc::clone(&self.gauge),
        })
    }

    /// Stops handing out slots. Pending and future `acquire` calls return
    /// `None`; permits already held stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.gauge.current.load(Ordering::Acquire)
    }

    /// Highest number of permits held at the same time so far.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.gauge.peak.load(Ordering::Acquire)
    }
}
