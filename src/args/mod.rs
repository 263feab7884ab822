//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod test_support;

pub use cli::TesterArgs;
pub use types::{HttpMethod, OutputFormat, Pacing, PositiveU64, PositiveUsize};

pub(crate) use defaults::{
    DEFAULT_CONFIG_FILES, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_USER_AGENT,
};
pub(crate) use parsers::{parse_duration_value, parse_header};
