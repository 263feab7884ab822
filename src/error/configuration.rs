use thiserror::Error;

/// Raised while building a `TestConfiguration`; fatal before any request is dispatched.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Number of requests must be greater than 0.")]
    RequestsZero,
    #[error("Concurrency must be greater than 0.")]
    ConcurrencyZero,
    #[error("Rate must be greater than 0.")]
    RateZero,
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL '{url}' must start with http:// or https://")]
    UnsupportedScheme { url: String },
    #[error("URL '{url}' is missing a host.")]
    MissingHost { url: String },
    #[error("Invalid header name '{name}'.")]
    InvalidHeaderName { name: String },
    #[error("Invalid value for header '{name}'.")]
    InvalidHeaderValue { name: String },
    #[error("{field} must be > 0.")]
    TimeoutZero { field: &'static str },
}
