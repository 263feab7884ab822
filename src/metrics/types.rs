use std::time::Duration;

use serde::Serialize;

/// Status value reported for requests that never produced a response.
pub const NO_RESPONSE_STATUS: i32 = -1;

/// Why a request produced no usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ErrorKind {
    /// DNS failure, refused or reset connection, connect timeout.
    ConnectionError,
    /// Reply that is not valid HTTP, truncated body, redirect loop.
    ProtocolError,
    /// The request task panicked or was cancelled before reporting.
    TaskFailure,
    Timeout,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::ProtocolError => "ProtocolError",
            ErrorKind::TaskFailure => "TaskFailure",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    /// `None` when no response was received.
    pub status: Option<u16>,
    /// Time from permit acquisition to completion or failure.
    pub elapsed: Duration,
    pub body_bytes: u64,
    pub error_kind: Option<ErrorKind>,
}

impl RequestOutcome {
    #[must_use]
    pub const fn response(status: u16, elapsed: Duration, body_bytes: u64) -> Self {
        Self {
            status: Some(status),
            elapsed,
            body_bytes,
            error_kind: None,
        }
    }

    #[must_use]
    pub const fn failure(kind: ErrorKind, elapsed: Duration) -> Self {
        Self {
            status: None,
            elapsed,
            body_bytes: 0,
            error_kind: Some(kind),
        }
    }

    #[must_use]
    pub const fn task_failure() -> Self {
        Self::failure(ErrorKind::TaskFailure, Duration::ZERO)
    }

    /// A response in the 200..=399 range with no recorded error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        match (self.status, self.error_kind) {
            (Some(status), None) => status >= 200 && status < 400,
            _ => false,
        }
    }

    /// Status code as reported, using [`NO_RESPONSE_STATUS`] when absent.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        self.status.map_or(NO_RESPONSE_STATUS, i32::from)
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Everything the collector gathered for one run.
#[derive(Debug, Clone)]
pub struct ResultSet {
    outcomes: Vec<RequestOutcome>,
    duration: Duration,
    requested: u64,
    interrupted: bool,
}

impl ResultSet {
    #[must_use]
    pub const fn new(
        outcomes: Vec<RequestOutcome>,
        duration: Duration,
        requested: u64,
        interrupted: bool,
    ) -> Self {
        Self {
            outcomes,
            duration,
            requested,
            interrupted,
        }
    }

    /// Outcomes in completion order.
    #[must_use]
    pub fn outcomes(&self) -> &[RequestOutcome] {
        &self.outcomes
    }

    /// Wall time from the start of dispatch until the last outcome arrived.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub const fn requested(&self) -> u64 {
        self.requested
    }

    #[must_use]
    pub const fn interrupted(&self) -> bool {
        self.interrupted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
