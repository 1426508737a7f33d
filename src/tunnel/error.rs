// ABOUTME: Tunnel lifecycle errors.
// ABOUTME: Covers spawn failures, early exits during warm-up, and failed kills.

use crate::invoke::ExternalToolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to start forwarder for {target}: {source}")]
    Spawn {
        target: String,
        #[source]
        source: ExternalToolError,
    },

    #[error("forwarder for {target} exited during warm-up ({status})")]
    Exited { target: String, status: String },

    #[error("failed to stop forwarder for {target}: {source}")]
    Kill {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("warm-up of {target} was cancelled")]
    Cancelled { target: String },
}
