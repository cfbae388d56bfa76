//! Session errors.

use std::time::Duration;
use thiserror::Error;

/// Reasons a session ended before relaying started.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dialing {addr} timed out after {after:?}")]
    DialTimeout { addr: String, after: Duration },

    #[error("failed to write header: {0}")]
    HeaderWrite(#[source] std::io::Error),
}

impl SessionError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Dial { .. } | SessionError::DialTimeout { .. } => "dial_failure",
            SessionError::HeaderWrite(_) => "header_write_failure",
        }
    }
}
