//! Transparent TCP proxy that prefixes every outbound connection with a
//! CNXMD connection-metadata header, then relays bytes both ways.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod relay;
pub mod resilience;
pub mod server;
pub mod session;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use protocol::{decode, encode, Header, HeaderError};
pub use relay::{DuplexRelay, RelayConfig, RelayReport};
pub use server::ProxyServer;
pub use session::{Destination, ProxySession, SessionError, SessionSettings};
