mod app;
mod config;
mod configuration;
mod http;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use configuration::ConfigurationError;
pub use http::HttpError;
pub use validation::ValidationError;
