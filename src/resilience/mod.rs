//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Accept failure in the server loop:
//!     → backoff.rs (exponential delay with jitter)
//!     → retry accept; give up after max_consecutive_errors in a row
//! ```
//!
//! # Design Decisions
//! - A failing accept never spins: every retry waits at least base_ms
//! - Jittered backoff avoids lockstep retries across processes
//! - Relay errors are not retried; a broken session just ends

pub mod backoff;
