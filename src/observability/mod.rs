//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, relay and accept loop produce:
//!     → logging.rs (structured events under per-session spans)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Session ID flows through every event of a connection via spans
//! - Metrics are cheap (atomic increments) and off unless enabled
//! - Nothing in the proxy's behavior depends on log output

pub mod logging;
pub mod metrics;
