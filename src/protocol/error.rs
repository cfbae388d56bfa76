//! Header decoding errors.

use thiserror::Error;

/// Reasons a buffer could not be decoded as a CNXMD header.
///
/// On any of these, the consumed byte count and partial entries are meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Input ended before the magic line or the terminating empty line.
    #[error("failed to read head line: unexpected end of input")]
    TruncatedHeader,

    /// The first line is not the protocol magic.
    #[error("unexpected head line: {}", String::from_utf8_lossy(.0))]
    BadMagic(Vec<u8>),

    /// A non-empty entry line without a `=` separator.
    #[error("invalid line: {}", String::from_utf8_lossy(.0))]
    InvalidEntryLine(Vec<u8>),
}

/// Reasons a key or value cannot be placed in a header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("key is empty")]
    EmptyKey,

    #[error("key {} contains '='", String::from_utf8_lossy(.0))]
    KeyContainsSeparator(Vec<u8>),

    #[error("key {} contains a newline", String::from_utf8_lossy(.0))]
    KeyContainsNewline(Vec<u8>),

    #[error("value for key {} contains a newline", String::from_utf8_lossy(.0))]
    ValueContainsNewline(Vec<u8>),
}
