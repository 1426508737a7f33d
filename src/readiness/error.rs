// ABOUTME: Readiness wait errors.
// ABOUTME: A deadline expiry is a ReadinessTimeout, distinct from tool failures.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("{what} not ready after {deadline:?}: {last}")]
    Timeout {
        what: String,
        deadline: Duration,
        last: String,
    },

    #[error("wait for {what} was cancelled")]
    Cancelled { what: String },
}
