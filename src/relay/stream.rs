//! Transport capability required by the relay.

use tokio::io::{AsyncRead, AsyncWrite};

/// A full-duplex byte stream the relay can drive.
///
/// - read: [`AsyncRead`]
/// - write: [`AsyncWrite`]
/// - close write half only: `AsyncWriteExt::shutdown` on the write half
/// - full close: dropping both halves
///
/// TCP sockets, Unix sockets, TLS streams and in-memory `tokio::io::duplex`
/// pipes all qualify.
pub trait RelayStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> RelayStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
