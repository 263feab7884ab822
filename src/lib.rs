//! Core library for the `volley` CLI.
//!
//! This crate provides the building blocks used by the binary: CLI argument
//! types, configuration loading, the rate scheduler and concurrency limiter,
//! request execution, outcome collection and report computation. The
//! primary user-facing interface is the `volley` command-line application;
//! library APIs may evolve as the CLI grows.
pub mod args;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod shutdown;
