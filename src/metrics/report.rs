use std::collections::BTreeMap;

use serde::Serialize;

use super::histogram::{HistogramBucket, build_histogram};
use super::percentiles::{
    PERCENTILE_P90, PERCENTILE_P95, PERCENTILE_P99, mean, median, percentile, std_dev,
};
use super::{ErrorKind, ResultSet};

const PERCENT: f64 = 100.0;
const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Latency statistics over successful requests, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation.
    pub std_dev_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    /// `-1` for requests that received no response.
    pub code: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorKindCount {
    pub kind: ErrorKind,
    pub count: u64,
}

/// Summary of one run. Computing it twice from the same results yields an
/// equal report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub duration_secs: f64,
    /// Requests the run was configured for.
    pub requested: u64,
    pub interrupted: bool,
    /// Outcomes actually recorded.
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate_pct: f64,
    pub failure_rate_pct: f64,
    pub total_bytes: u64,
    pub actual_rps: f64,
    /// Megabits per second of response body.
    pub throughput_mbps: f64,
    /// Absent when no request succeeded.
    pub latency: Option<LatencyStats>,
    /// Present only with enough successful samples.
    pub histogram: Option<Vec<HistogramBucket>>,
    /// Ascending by code.
    pub status_codes: Vec<StatusCount>,
    /// Ascending by kind name.
    pub error_kinds: Vec<ErrorKindCount>,
}

/// Derives the run summary from collected outcomes. Pure: no I/O, no clock.
#[must_use]
pub fn compute_report(results: &ResultSet) -> Report {
    let outcomes = results.outcomes();
    let total_requests = u64::try_from(outcomes.len()).unwrap_or(u64::MAX);
    let mut successful_requests: u64 = 0;
    let mut total_bytes: u64 = 0;
    let mut status_codes: BTreeMap<i32, u64> = BTreeMap::new();
    let mut error_kinds: BTreeMap<&'static str, (ErrorKind, u64)> = BTreeMap::new();
    let mut latencies_ms: Vec<f64> = Vec::new();

    for outcome in outcomes {
        total_bytes = total_bytes.saturating_add(outcome.body_bytes);
        let code_count = status_codes.entry(outcome.status_code()).or_insert(0);
        *code_count = code_count.saturating_add(1);
        if let Some(kind) = outcome.error_kind {
            let kind_count = error_kinds.entry(kind.as_str()).or_insert((kind, 0));
            kind_count.1 = kind_count.1.saturating_add(1);
        }
        if outcome.is_success() {
            successful_requests = successful_requests.saturating_add(1);
            latencies_ms.push(outcome.elapsed_ms());
        }
    }
    latencies_ms.sort_by(f64::total_cmp);

    let failed_requests = total_requests.saturating_sub(successful_requests);
    let duration_secs = results.duration().as_secs_f64();

    Report {
        duration_secs,
        requested: results.requested(),
        interrupted: results.interrupted(),
        total_requests,
        successful_requests,
        failed_requests,
        success_rate_pct: ratio_pct(successful_requests, total_requests),
        failure_rate_pct: ratio_pct(failed_requests, total_requests),
        total_bytes,
        actual_rps: per_second(total_requests as f64, duration_secs),
        throughput_mbps: per_second(
            total_bytes as f64 * BITS_PER_BYTE / BITS_PER_MEGABIT,
            duration_secs,
        ),
        latency: latency_stats(&latencies_ms),
        histogram: build_histogram(&latencies_ms),
        status_codes: status_codes
            .into_iter()
            .map(|(code, count)| StatusCount { code, count })
            .collect(),
        error_kinds: error_kinds
            .into_values()
            .map(|(kind, count)| ErrorKindCount { kind, count })
            .collect(),
    }
}

fn latency_stats(sorted_ms: &[f64]) -> Option<LatencyStats> {
    let mean_ms = mean(sorted_ms)?;
    Some(LatencyStats {
        mean_ms,
        median_ms: median(sorted_ms)?,
        min_ms: *sorted_ms.first()?,
        max_ms: *sorted_ms.last()?,
        std_dev_ms: std_dev(sorted_ms, mean_ms)?,
        p90_ms: percentile(sorted_ms, PERCENTILE_P90)?,
        p95_ms: percentile(sorted_ms, PERCENTILE_P95)?,
        p99_ms: percentile(sorted_ms, PERCENTILE_P99)?,
    })
}

fn ratio_pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * PERCENT
}

fn per_second(amount: f64, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 {
        amount / duration_secs
    } else {
        0.0
    }
}
