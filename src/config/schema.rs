//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::protocol::Header;
use crate::relay::RelayConfig;
use crate::session::{Destination, SessionSettings};

/// Root configuration for the metadata proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Where proxied connections are forwarded.
    pub destination: DestinationConfig,

    /// Header entries injected into every outbound connection.
    pub metadata: BTreeMap<String, String>,

    /// Relay tuning.
    pub relay: RelaySettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Accept error handling.
    pub accept: AcceptConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Resolve the per-session settings this config describes.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            destination: Destination::new(self.destination.host.clone(), self.destination.port),
            header: Header::from(&self.metadata),
            connect_timeout: self.timeouts.connect_secs.map(Duration::from_secs),
            relay: RelayConfig {
                teardown: Duration::from_secs(self.relay.teardown_secs),
                buffer_size: self.relay.buffer_size,
            },
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    pub bind_address: String,

    /// Maximum concurrent sessions (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9090".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Destination the proxy dials for each session.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DestinationConfig {
    /// Hostname or IP address.
    pub host: String,

    pub port: u16,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9091,
        }
    }
}

/// Relay tuning as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelaySettings {
    /// Seconds to wait for the second direction after the first finished.
    pub teardown_secs: u64,

    /// Copy buffer size per direction, in bytes.
    pub buffer_size: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            teardown_secs: relay.teardown.as_secs(),
            buffer_size: relay.buffer_size,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Destination connect timeout in seconds. Unbounded when unset.
    pub connect_secs: Option<u64>,

    /// How long shutdown waits for in-flight sessions, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: None,
            drain_secs: 30,
        }
    }
}

/// Accept loop error handling.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AcceptConfig {
    /// Base backoff after a failed accept.
    pub backoff_base_ms: u64,

    /// Backoff cap.
    pub backoff_max_ms: u64,

    /// Consecutive accept failures tolerated before the server gives up.
    pub max_consecutive_errors: u32,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 10,
            backoff_max_ms: 1000,
            max_consecutive_errors: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive; `RUST_LOG` takes precedence when set.
    pub log_filter: String,

    /// Colored log output.
    pub ansi: bool,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "cnxmd_proxy=info".to_string(),
            ansi: true,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
