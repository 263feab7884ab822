mod collector;
mod histogram;
mod percentiles;
mod report;
mod types;


pub use collector::{collect_outcomes, run_load_test};
pub use histogram::{HISTOGRAM_MAX_BUCKETS, HISTOGRAM_MIN_SAMPLES, HistogramBucket};
pub use report::{ErrorKindCount, LatencyStats, Report, StatusCount, compute_report};
pub use types::{ErrorKind, NO_RESPONSE_STATUS, RequestOutcome, ResultSet};
