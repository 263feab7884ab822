use std::time::Duration;

use crate::args::Pacing;
use crate::config::TestConfiguration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Maps a dispatch index to its release offset from the start of the run.
///
/// Staircase pacing releases requests in whole-second blocks of `rate`, so
/// index `i` becomes eligible at `floor(i / rate)` seconds. Even pacing spreads
/// the same budget uniformly at `i / rate` seconds. Both keep the number of
/// releases inside any one-second window starting at offset zero at or below
/// `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSchedule {
    rate: u64,
    pacing: Pacing,
}

impl RateSchedule {
    /// A zero rate is treated as one request per second.
    #[must_use]
    pub const fn new(rate: u64, pacing: Pacing) -> Self {
        let rate = if rate == 0 { 1 } else { rate };
        Self { rate, pacing }
    }

    #[must_use]
    pub const fn from_config(config: &TestConfiguration) -> Self {
        Self::new(config.rate(), config.pacing())
    }

    #[must_use]
    pub const fn rate(&self) -> u64 {
        self.rate
    }

    #[must_use]
    pub const fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Release offset for the request at `index`.
    #[must_use]
    pub fn dispatch_delay(&self, index: u64) -> Duration {
        match self.pacing {
            Pacing::Staircase => Duration::from_secs(div_floor(index, self.rate)),
            Pacing::Even => {
                let nanos = u128::from(index)
                    .saturating_mul(NANOS_PER_SEC)
                    .checked_div(u128::from(self.rate))
                    .unwrap_or(0);
                let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
                let subsec = u32::try_from(nanos % NANOS_PER_SEC).unwrap_or(0);
                Duration::new(secs, subsec)
            }
        }
    }
}

const fn div_floor(value: u64, divisor: u64) -> u64 {
    match value.checked_div(divisor) {
        Some(quotient) => quotient,
        None => 0,
    }
}
