//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Wait for in-flight sessions to finish on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Largest connection cap the listener can enforce and later drain in one
/// `acquire_many` call.
pub const MAX_CONNECTIONS: usize = if (u32::MAX as usize) < Semaphore::MAX_PERMITS {
    u32::MAX as usize
} else {
    Semaphore::MAX_PERMITS
};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection limit closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent sessions.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// accepting waits until a slot becomes available.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(listener, config.max_connections))
    }

    /// Wrap an already bound listener. Caps above [`MAX_CONNECTIONS`] are clamped.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Self {
        if max_connections > MAX_CONNECTIONS {
            tracing::warn!(
                requested = max_connections,
                limit = MAX_CONNECTIONS,
                "Connection cap too large, clamping"
            );
        }
        let max_connections = max_connections.min(MAX_CONNECTIONS);
        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections,
                "Listener bound"
            );
        }
        Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the session's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Wait until every permit is back, i.e. all sessions have ended.
    ///
    /// Returns `false` if sessions were still running when `timeout` expired.
    pub async fn drain(&self, timeout: Duration) -> bool {
        // Exact: from_tcp keeps max_connections within u32.
        let all = self.max_connections as u32;
        tokio::time::timeout(timeout, self.connection_limit.acquire_many(all))
            .await
            .map(|permits| permits.is_ok())
            .unwrap_or(false)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a session slot.
///
/// When dropped, the slot is released back to the pool, even if the session
/// task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_track_sessions() {
        let listener = Listener::bind(&ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 2,
        })
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        assert!(!listener.drain(Duration::from_millis(50)).await);
        drop(permit);
        assert!(listener.drain(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn oversized_cap_is_clamped_and_drains() {
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener = Listener::from_tcp(tcp, usize::MAX);
        assert_eq!(listener.max_connections(), MAX_CONNECTIONS);
        assert_eq!(listener.available_permits(), MAX_CONNECTIONS);
        assert!(listener.drain(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn bad_bind_address() {
        let result = Listener::bind(&ListenerConfig {
            bind_address: "nope".into(),
            max_connections: 1,
        })
        .await;
        assert!(matches!(result, Err(ListenerError::Bind(_))));
    }
}
