/// Percentiles reported for successful request latencies.
pub(crate) const PERCENTILE_P90: f64 = 90.0;
pub(crate) const PERCENTILE_P95: f64 = 95.0;
pub(crate) const PERCENTILE_P99: f64 = 99.0;
const PERCENT_DIVISOR: f64 = 100.0;

/// Percentile of an ascending slice using linear interpolation between the
/// closest ranks, `rank = pct / 100 * (n - 1)`.
///
/// Returns `None` for an empty slice.
pub(crate) fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (pct / PERCENT_DIVISOR).clamp(0.0, 1.0) * last as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = (rank.ceil() as usize).min(last);
    let lower = *sorted.get(lower_idx)?;
    let upper = *sorted.get(upper_idx)?;
    let fraction = rank - rank.floor();
    Some(lower + (upper - lower) * fraction)
}

/// Middle value of an ascending slice, averaging the two central values for
/// even lengths.
pub(crate) fn median(sorted: &[f64]) -> Option<f64> {
    percentile(sorted, 50.0)
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64], mean: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}
