use clap::Parser;
use std::time::Duration;

use super::parsers::{
    parse_bool_env, parse_duration_arg, parse_header, parse_positive_u64, parse_positive_usize,
};
use super::types::{HttpMethod, OutputFormat, Pacing, PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Concurrent HTTP load generator - rate-scheduled, concurrency-bounded requests with latency percentiles and status/error breakdowns.",
    next_help_heading = "Advanced Options"
)]
pub struct TesterArgs {
    /// Target URL (http:// or https://)
    #[arg(value_name = "URL", help_heading = "Common Options")]
    pub url: Option<String>,

    /// HTTP method to use
    #[arg(
        long,
        short = 'm',
        short_alias = 'X',
        default_value = "get",
        ignore_case = true,
        help_heading = "Common Options"
    )]
    pub method: HttpMethod,

    /// Total number of requests to send
    #[arg(
        long = "requests",
        short = 'n',
        default_value = "100",
        value_parser = parse_positive_u64,
        help_heading = "Common Options"
    )]
    pub requests: PositiveU64,

    /// Maximum number of in-flight requests
    #[arg(
        long = "concurrency",
        short = 'c',
        alias = "concurrent",
        default_value = "10",
        value_parser = parse_positive_usize,
        help_heading = "Common Options"
    )]
    pub concurrency: PositiveUsize,

    /// Target request rate (requests per second)
    #[arg(
        long = "rate",
        short = 'r',
        default_value = "10",
        value_parser = parse_positive_u64,
        help_heading = "Common Options"
    )]
    pub rate: PositiveU64,

    /// HTTP header to add (repeatable, format 'Key: Value')
    #[arg(long = "header", short = 'H', value_parser = parse_header, help_heading = "Common Options")]
    pub headers: Vec<(String, String)>,

    /// JSON payload, or a path to a JSON file, sent with POST/PUT/PATCH
    #[arg(long, short, help_heading = "Common Options")]
    pub data: Option<String>,

    /// How the target rate is turned into dispatch times
    #[arg(long = "pacing", default_value = "staircase", value_enum)]
    pub pacing: Pacing,

    /// Total per-request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "30s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Timeout for establishing a new connection (supports ms/s/m/h)
    #[arg(
        long = "connect-timeout",
        default_value = "10s",
        value_parser = parse_duration_arg
    )]
    pub connect_timeout: Duration,

    /// Grace period for in-flight requests after an interrupt (supports ms/s/m/h)
    #[arg(
        long = "drain-timeout",
        default_value = "5s",
        value_parser = parse_duration_arg
    )]
    pub drain_timeout: Duration,

    /// Report format written to stdout
    #[arg(long = "output-format", default_value = "text", value_enum)]
    pub output_format: OutputFormat,

    /// Disable the progress line on stderr
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Disable color output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,

    /// Enable verbose logging (sets log level to debug unless overridden by VOLLEY_LOG/RUST_LOG)
    #[arg(long, short = 'v', alias = "debug", help_heading = "Common Options")]
    pub verbose: bool,

    /// Path to a TOML or JSON config file (defaults to ./volley.toml or ./volley.json)
    #[arg(long, help_heading = "Common Options")]
    pub config: Option<String>,
}
