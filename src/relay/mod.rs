//! Bidirectional relay subsystem.
//!
//! # Data Flow
//! ```text
//! client ──read──▶ [copy client→server] ──write──▶ server
//! client ◀─write── [copy server→client] ◀──read─── server
//!
//! Each copy task, when done:
//!     → shutdown() the destination's write half (half-close)
//!     → try_send(CopyOutcome) on the completion channel (capacity 2)
//!
//! Orchestrator:
//!     Running ──first report──▶ FirstClosed ──second report or teardown timer──▶ TornDown
//! ```
//!
//! # Design Decisions
//! - The two directions never share mutable state; the channel is the only link
//! - Reset/aborted/broken-pipe errors are an ordinary end of session, not a failure
//! - After the teardown bound the remaining copy task is aborted and its halves dropped

pub mod duplex;
pub mod stream;

use std::io;
use std::time::Duration;

pub use duplex::DuplexRelay;
pub use stream::RelayStream;

/// Default wait for the second direction once the first has finished.
pub const DEFAULT_TEARDOWN: Duration = Duration::from_secs(35);

/// Default copy buffer per direction.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Relay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Bound on the wait for the second direction after the first finished.
    pub teardown: Duration,
    /// Size of each direction's copy buffer.
    pub buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            teardown: DEFAULT_TEARDOWN,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// One of the two relayed endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Server => write!(f, "server"),
        }
    }
}

/// Copy direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// The side whose read half feeds this direction, i.e. the side that
    /// closed when this direction finishes.
    pub fn source(&self) -> Side {
        match self {
            Direction::ClientToServer => Side::Client,
            Direction::ServerToClient => Side::Server,
        }
    }

    /// The side whose write half this direction shuts down when it finishes.
    pub fn destination(&self) -> Side {
        match self {
            Direction::ClientToServer => Side::Server,
            Direction::ServerToClient => Side::Client,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToServer => "client_to_server",
            Direction::ServerToClient => "server_to_client",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a copy direction stopped.
#[derive(Debug)]
pub enum CloseReason {
    /// Source reached end of stream.
    Eof,
    /// Peer went away (reset, abort, broken pipe). Expected, not a failure.
    Benign(io::ErrorKind),
    /// Any other I/O error.
    Failed(io::Error),
}

impl CloseReason {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, CloseReason::Failed(_))
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Eof => write!(f, "eof"),
            CloseReason::Benign(kind) => write!(f, "peer disconnected ({})", kind),
            CloseReason::Failed(e) => write!(f, "i/o error: {}", e),
        }
    }
}

/// Classify an error seen while copying.
pub fn classify_io_error(err: io::Error) -> CloseReason {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => CloseReason::Benign(err.kind()),
        _ => CloseReason::Failed(err),
    }
}

/// Completion report posted by a copy task.
#[derive(Debug)]
pub struct CopyOutcome {
    pub direction: Direction,
    /// Bytes written to the destination.
    pub bytes: u64,
    pub reason: CloseReason,
}

/// Relay lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Running,
    FirstClosed,
    TornDown,
}

/// How the relay ended after the first direction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The second direction reported within the bound.
    Completed,
    /// The bound expired; the second direction was aborted.
    TimedOut,
}

/// Summary of a finished relay.
#[derive(Debug)]
pub struct RelayReport {
    /// First direction to finish. `None` only if both copy tasks died
    /// without reporting.
    pub first: Option<CopyOutcome>,
    /// Second direction, absent when the teardown bound expired.
    pub second: Option<CopyOutcome>,
    pub teardown: Teardown,
    pub state: RelayState,
}

impl RelayReport {
    /// Side that closed first.
    pub fn first_closed(&self) -> Option<Side> {
        self.first.as_ref().map(|o| o.direction.source())
    }

    /// Bytes moved in the given direction, if that direction reported.
    pub fn bytes(&self, direction: Direction) -> Option<u64> {
        [self.first.as_ref(), self.second.as_ref()]
            .into_iter()
            .flatten()
            .find(|o| o.direction == direction)
            .map(|o| o.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_and_closed_are_benign() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::NotConnected,
            io::ErrorKind::UnexpectedEof,
        ] {
            let reason = classify_io_error(io::Error::from(kind));
            assert!(matches!(reason, CloseReason::Benign(k) if k == kind));
            assert!(!reason.is_abnormal());
        }
    }

    #[test]
    fn other_errors_are_abnormal() {
        let reason = classify_io_error(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert!(reason.is_abnormal());
        assert_eq!(reason.to_string(), "i/o error: disk on fire");

        let reason = classify_io_error(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(reason.is_abnormal());
    }

    #[test]
    fn direction_sides() {
        assert_eq!(Direction::ClientToServer.source(), Side::Client);
        assert_eq!(Direction::ClientToServer.destination(), Side::Server);
        assert_eq!(Direction::ServerToClient.source(), Side::Server);
        assert_eq!(Direction::ServerToClient.to_string(), "server_to_client");
    }

    #[test]
    fn default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.teardown, Duration::from_secs(35));
        assert_eq!(config.buffer_size, 16 * 1024);
    }
}
