//! CNXMD header protocol.
//!
//! # Wire Format
//! ```text
//! CONNECTION_METADATA/1.1\n      magic line, must match exactly
//! key=value\n                    zero or more entries
//! key=value=with=equals\n        value keeps every `=` after the first
//! \n                             empty line terminates the header
//! <payload bytes...>             not part of the header
//! ```
//!
//! # Design Decisions
//! - Keys and values are raw bytes; anything but `\n` (and `=` in keys) round-trips
//! - Entries are kept in an ordered map so encoding is deterministic
//! - Decoding reports the exact number of bytes consumed so callers can find
//!   where the payload starts in a buffer that holds more than the header

pub mod error;
pub mod header;
pub mod reader;

pub use error::HeaderError;
pub use header::{decode, encode, validate_entry, validate_key, validate_value, Header, KV_DELIM, LINE_DELIM, MAGIC};
pub use reader::{read_header, ReadHeaderError};
