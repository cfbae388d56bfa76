//! Structured logging.
//!
//! Log events carry `session_id` through the `session` and `relay` spans
//! that `ProxySession` and `DuplexRelay` are constructed with, so a single
//! connection can be followed with a plain filter on that field.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the process-wide subscriber.
///
/// `RUST_LOG` overrides the configured filter when set. Calling this twice
/// is an error from `tracing-subscriber`, surfaced to the caller.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(config.ansi).with_target(false))
        .try_init()
}
