//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, metadata entry rules)
//!     → ProxyConfig (validated, immutable)
//!     → SessionSettings handed to each new session
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the SessionSettings used for new sessions
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AcceptConfig, DestinationConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RelaySettings,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
