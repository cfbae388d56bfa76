//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0, ports valid)
//! - Reject metadata entries that would not survive the header encoding
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::net::listener::MAX_CONNECTIONS;
use crate::protocol::error::EntryError;
use crate::protocol::header::validate_entry;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("destination host is empty")]
    EmptyDestinationHost,

    #[error("destination port must be non-zero")]
    ZeroDestinationPort,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("invalid metadata entry: {0}")]
    Metadata(#[from] EntryError),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    } else if config.listener.max_connections > MAX_CONNECTIONS {
        errors.push(ValidationError::TooLarge {
            field: "listener.max_connections",
            max: MAX_CONNECTIONS,
        });
    }

    if config.destination.host.trim().is_empty() {
        errors.push(ValidationError::EmptyDestinationHost);
    }
    if config.destination.port == 0 {
        errors.push(ValidationError::ZeroDestinationPort);
    }

    for (key, value) in &config.metadata {
        if let Err(e) = validate_entry(key.as_bytes(), value.as_bytes()) {
            errors.push(e.into());
        }
    }

    if config.relay.teardown_secs == 0 {
        errors.push(ValidationError::Zero { field: "relay.teardown_secs" });
    }
    if config.relay.buffer_size == 0 {
        errors.push(ValidationError::Zero { field: "relay.buffer_size" });
    }
    if config.timeouts.connect_secs == Some(0) {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.accept.max_consecutive_errors == 0 {
        errors.push(ValidationError::Zero { field: "accept.max_consecutive_errors" });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.destination.host = " ".into();
        config.destination.port = 0;
        config.relay.teardown_secs = 0;
        config.metadata.insert("bad=key".into(), "v".into());
        config.metadata.insert("ok".into(), "line\nbreak".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::EmptyDestinationHost));
        assert!(errors.contains(&ValidationError::Zero { field: "relay.teardown_secs" }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Metadata(EntryError::KeyContainsSeparator(_)))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Metadata(EntryError::ValueContainsNewline(_)))));
    }

    #[test]
    fn connection_cap_is_bounded() {
        let mut config = ProxyConfig::default();
        config.listener.max_connections = MAX_CONNECTIONS;
        assert!(validate_config(&config).is_ok());

        config.listener.max_connections = MAX_CONNECTIONS + 1;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::TooLarge {
                field: "listener.max_connections",
                max: MAX_CONNECTIONS,
            }])
        );

        config.listener.max_connections = 0;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::Zero { field: "listener.max_connections" }])
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }

    #[test]
    fn values_may_contain_separator() {
        let mut config = ProxyConfig::default();
        config.metadata.insert("tags".into(), "env=prod".into());
        assert!(validate_config(&config).is_ok());
    }
}
