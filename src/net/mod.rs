//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (session ID, in-flight tracking)
//!     → Hand off to session layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each session tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{SessionGuard, SessionId, SessionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
