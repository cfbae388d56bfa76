//! Per-connection proxy session.
//!
//! # Data Flow
//! ```text
//! inbound stream (accepted by the listener)
//!     → dial destination            (failure: drop inbound, no header, no relay)
//!     → write encoded CNXMD header  (failure: drop both, no relay)
//!     → DuplexRelay until both directions end or teardown expires
//! ```
//!
//! # Design Decisions
//! - The header is fully written and flushed before any payload is relayed
//! - The session owns the inbound stream; every exit path drops it
//! - No retries: a failed session is simply a closed connection to the peer

pub mod error;

use std::fmt;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::net::connection::SessionId;
use crate::protocol::Header;
use crate::relay::{DuplexRelay, RelayConfig, RelayReport, RelayStream};

pub use error::SessionError;

/// Address the proxy forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Everything a session needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub destination: Destination,
    pub header: Header,
    /// Optional bound on dialing; unbounded when `None`.
    pub connect_timeout: Option<Duration>,
    pub relay: RelayConfig,
}

/// Proxies one inbound connection to the destination.
#[derive(Debug, Clone)]
pub struct ProxySession {
    settings: SessionSettings,
    span: tracing::Span,
}

impl ProxySession {
    /// Create a session that logs under `span`.
    pub fn new(settings: SessionSettings, span: tracing::Span) -> Self {
        Self { settings, span }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Dial the destination, send the header, and relay until the session ends.
    pub async fn handle<I>(&self, inbound: I, session_id: &SessionId) -> Result<RelayReport, SessionError>
    where
        I: RelayStream,
    {
        let span = tracing::info_span!(
            parent: &self.span,
            "session",
            session_id = %session_id,
            destination = %self.settings.destination
        );
        async {
            tracing::info!("Accepted inbound connection");
            let outbound = self.dial().await?;
            self.relay_with(inbound, outbound, session_id).await
        }
        .instrument(span)
        .await
    }

    /// Send the header on an already established outbound stream and relay.
    ///
    /// Used directly when the caller supplies its own transport instead of TCP.
    pub async fn relay_with<I, O>(&self, inbound: I, mut outbound: O, session_id: &SessionId) -> Result<RelayReport, SessionError>
    where
        I: RelayStream,
        O: RelayStream,
    {
        let header = self.settings.header.encode();
        if let Err(e) = write_header(&mut outbound, &header).await {
            tracing::warn!(error = %e, header_len = header.len(), "Failed to write header");
            return Err(SessionError::HeaderWrite(e));
        }
        tracing::info!(header_len = header.len(), entries = self.settings.header.len(), "Header written");

        let relay = DuplexRelay::new(self.settings.relay, tracing::Span::current());
        let report = relay.run(inbound, outbound, session_id).await;
        tracing::info!(
            first_closed = ?report.first_closed(),
            teardown = ?report.teardown,
            "Session finished"
        );
        Ok(report)
    }

    async fn dial(&self) -> Result<TcpStream, SessionError> {
        let dest = &self.settings.destination;
        let addr = dest.to_string();
        let connect = TcpStream::connect((dest.host.as_str(), dest.port));

        let result = match self.settings.connect_timeout {
            Some(after) => match tokio::time::timeout(after, connect).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(after = ?after, "Dial timed out");
                    return Err(SessionError::DialTimeout { addr, after });
                }
            },
            None => connect.await,
        };

        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                tracing::info!(peer = ?stream.peer_addr().ok(), "Connected to destination");
                Ok(stream)
            }
            Err(source) => {
                tracing::warn!(error = %source, "Failed to dial destination");
                Err(SessionError::Dial { addr, source })
            }
        }
    }
}

/// Write the whole header. `write_all` turns a zero-length write into
/// `WriteZero`, so a short write always surfaces as an error.
async fn write_header<O>(outbound: &mut O, header: &[u8]) -> std::io::Result<()>
where
    O: RelayStream,
{
    outbound.write_all(header).await?;
    outbound.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_header, reader::DEFAULT_MAX_HEADER_LEN};
    use tokio::io::{duplex, AsyncReadExt, BufReader};
    use tokio::net::TcpListener;

    fn settings(destination: Destination) -> SessionSettings {
        SessionSettings {
            destination,
            header: Header::from_iter([("tenant", "acme"), ("route", "a=b")]),
            connect_timeout: None,
            relay: RelayConfig {
                teardown: Duration::from_secs(5),
                buffer_size: 1024,
            },
        }
    }

    #[test]
    fn destination_display() {
        assert_eq!(Destination::new("example.com", 443).to_string(), "example.com:443");
        assert_eq!(Destination::new("::1", 80).to_string(), "[::1]:80");
    }

    #[tokio::test]
    async fn header_precedes_payload() {
        let session = ProxySession::new(settings(Destination::new("unused", 1)), tracing::Span::none());
        let (mut client_app, client_proxy) = duplex(4096);
        let (server_proxy, server_app) = duplex(4096);

        let handle = tokio::spawn(async move {
            session
                .relay_with(client_proxy, server_proxy, &SessionId::from("sess0001"))
                .await
        });

        client_app.write_all(b"ping").await.unwrap();
        client_app.shutdown().await.unwrap();

        let mut server_app = BufReader::new(server_app);
        let (_, header) = read_header(&mut server_app, DEFAULT_MAX_HEADER_LEN).await.unwrap();
        assert_eq!(header.get_str("tenant"), Some("acme"));
        assert_eq!(header.get_str("route"), Some("a=b"));

        let mut payload = Vec::new();
        server_app.read_to_end(&mut payload).await.unwrap();
        assert_eq!(payload, b"ping");
        server_app.get_mut().shutdown().await.unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.bytes(crate::relay::Direction::ClientToServer), Some(4));
    }

    #[tokio::test]
    async fn dial_failure_drops_inbound() {
        // Grab a free port, then close it so the dial is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let session = ProxySession::new(settings(Destination::new("127.0.0.1", port)), tracing::Span::none());
        let (mut client_app, client_proxy) = duplex(64);

        let err = session
            .handle(client_proxy, &SessionId::from("sess0002"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Dial { .. }));

        let mut buf = Vec::new();
        client_app.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn header_write_failure_aborts() {
        let session = ProxySession::new(settings(Destination::new("unused", 1)), tracing::Span::none());
        let (_client_app, client_proxy) = duplex(64);
        let (server_proxy, server_app) = duplex(64);
        drop(server_app);

        let err = session
            .relay_with(client_proxy, server_proxy, &SessionId::from("sess0003"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::HeaderWrite(_)));
    }
}
