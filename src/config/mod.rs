//! Configuration loading, precedence merge, and the validated run configuration.
mod apply;
mod loader;
mod payload;
mod run;
pub mod types;


pub use apply::apply_config;
pub use loader::load_config;
pub use payload::load_payload;
pub use run::{RequestBody, TestConfiguration};

#[cfg(test)]
pub(crate) use loader::load_config_file;
