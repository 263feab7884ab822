mod progress;
mod runner;
mod summary;

pub(crate) use runner::{RunOptions, run_local};
