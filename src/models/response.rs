use std::time::Duration;

use crate::error::NetworkError;

/// What one request produced: status code and round-trip latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub latency: Duration,
}

/// Result of one iteration's request. `Err` is the failed-response marker
/// checks are evaluated against when the network call did not complete.
pub type Outcome = Result<Response, NetworkError>;
