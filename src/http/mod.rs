mod client;
mod executor;
mod limiter;
mod rate;

#[cfg(test)]
mod tests;

pub use client::{HttpSender, RequestSender, ResponseSummary, classify_error};
pub use executor::Dispatcher;
pub use limiter::{ConcurrencyLimiter, InFlightPermit};
pub use rate::RateSchedule;
