use crate::args::OutputFormat;
use crate::error::AppResult;
use crate::metrics::{HistogramBucket, NO_RESPONSE_STATUS, Report};

/// Widest histogram bar, reached by the fullest bucket.
const HISTOGRAM_BAR_WIDTH: u64 = 40;
const RULE_WIDTH: usize = 60;

pub(crate) fn print_report(report: &Report, format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Text => {
            for line in report_lines(report) {
                println!("{}", line);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

pub(crate) fn report_lines(report: &Report) -> Vec<String> {
    let mut lines = Vec::new();
    let rule = "=".repeat(RULE_WIDTH);

    lines.push(rule.clone());
    lines.push("Performance Report".to_owned());
    lines.push(rule);
    if report.interrupted {
        lines.push(format!(
            "Interrupted: {} of {} requests recorded",
            report.total_requests, report.requested
        ));
    }

    lines.push("Summary:".to_owned());
    lines.push(format!("  {:<28} {:.2}s", "Total Duration:", report.duration_secs));
    lines.push(format!("  {:<28} {}", "Total Requests:", report.total_requests));
    lines.push(format!("  {:<28} {:.2}", "Actual Requests/Sec:", report.actual_rps));
    lines.push(format!(
        "  {:<28} {:.2} MB",
        "Total Data Transferred:",
        report.total_bytes as f64 / (1024.0 * 1024.0)
    ));
    lines.push(format!("  {:<28} {:.2} Mbps", "Throughput:", report.throughput_mbps));

    lines.push(String::new());
    lines.push("Request Outcomes:".to_owned());
    lines.push(format!(
        "  {:<28} {} ({:.1}%)",
        "Successful Requests:", report.successful_requests, report.success_rate_pct
    ));
    lines.push(format!(
        "  {:<28} {} ({:.1}%)",
        "Failed Requests:", report.failed_requests, report.failure_rate_pct
    ));

    lines.push(String::new());
    match &report.latency {
        Some(latency) => {
            lines.push("Latency (ms):".to_owned());
            lines.push(format!("  {:<15} {:.2}", "Average:", latency.mean_ms));
            lines.push(format!("  {:<15} {:.2}", "Median (p50):", latency.median_ms));
            lines.push(format!(
                "  {:<15} {:.2} | {:.2}",
                "Min | Max:", latency.min_ms, latency.max_ms
            ));
            lines.push(format!("  {:<15} {:.2}", "Std Dev:", latency.std_dev_ms));
            lines.push(format!("  {:<15} {:.2}", "p90:", latency.p90_ms));
            lines.push(format!("  {:<15} {:.2}", "p95:", latency.p95_ms));
            lines.push(format!("  {:<15} {:.2}", "p99:", latency.p99_ms));
        }
        None => lines.push("No successful responses; latency statistics omitted.".to_owned()),
    }

    if let Some(buckets) = &report.histogram {
        lines.push(String::new());
        lines.push("Response Time Distribution (ms):".to_owned());
        lines.extend(histogram_lines(buckets));
    }

    lines.push(String::new());
    lines.push("Status Codes:".to_owned());
    for entry in &report.status_codes {
        lines.push(format!(
            "  - {:<14}: {} responses",
            status_label(entry.code),
            entry.count
        ));
    }

    if !report.error_kinds.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_owned());
        for entry in &report.error_kinds {
            lines.push(format!("  - {:<16}: {} occurrences", entry.kind, entry.count));
        }
    }

    lines
}

fn status_label(code: i32) -> String {
    if code == NO_RESPONSE_STATUS {
        "Network Error".to_owned()
    } else {
        code.to_string()
    }
}

fn histogram_lines(buckets: &[HistogramBucket]) -> Vec<String> {
    let max_count = buckets.iter().map(|bucket| bucket.count).max().unwrap_or(0);
    buckets
        .iter()
        .map(|bucket| {
            let width = bucket
                .count
                .saturating_mul(HISTOGRAM_BAR_WIDTH)
                .checked_div(max_count)
                .unwrap_or(0);
            let bar = "#".repeat(usize::try_from(width).unwrap_or(0));
            format!(
                "  {:>9.2} - {:<9.2} | {:<40} ({})",
                bucket.lower_ms, bucket.upper_ms, bar, bucket.count
            )
        })
        .collect()
}
