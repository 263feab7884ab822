use serde::Serialize;

/// Fewer successful samples than this produce no histogram.
pub const HISTOGRAM_MIN_SAMPLES: usize = 10;
pub const HISTOGRAM_MAX_BUCKETS: usize = 10;
/// Half-width of the range used when every sample has the same value.
const DEGENERATE_HALF_WIDTH_MS: f64 = 0.5;

/// One equal-width latency bin. Every bin is half-open `[lower, upper)`
/// except the last, which also includes its upper edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub lower_ms: f64,
    pub upper_ms: f64,
    pub count: u64,
}

/// Buckets an ascending slice of latencies into `min(10, n)` equal-width
/// bins spanning `[min, max]`.
pub(crate) fn build_histogram(sorted_ms: &[f64]) -> Option<Vec<HistogramBucket>> {
    if sorted_ms.len() < HISTOGRAM_MIN_SAMPLES {
        return None;
    }
    let (first, last) = (*sorted_ms.first()?, *sorted_ms.last()?);
    let (lower, upper) = if last - first > 0.0 {
        (first, last)
    } else {
        (first - DEGENERATE_HALF_WIDTH_MS, last + DEGENERATE_HALF_WIDTH_MS)
    };

    let bins = sorted_ms.len().min(HISTOGRAM_MAX_BUCKETS);
    let width = (upper - lower) / bins as f64;
    let last_bin = bins.saturating_sub(1);

    let mut counts = vec![0_u64; bins];
    for value in sorted_ms {
        let offset = ((value - lower) / width).floor();
        let idx = if offset <= 0.0 {
            0
        } else {
            (offset as usize).min(last_bin)
        };
        if let Some(count) = counts.get_mut(idx) {
            *count = count.saturating_add(1);
        }
    }

    let buckets = counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBucket {
            lower_ms: lower + width * idx as f64,
            upper_ms: if idx == last_bin {
                upper
            } else {
                lower + width * (idx + 1) as f64
            },
            count,
        })
        .collect();
    Some(buckets)
}
