//! Header encoding and decoding.

use std::collections::BTreeMap;

use crate::protocol::error::{EntryError, HeaderError};

/// Protocol magic, always the first line of a header.
pub const MAGIC: &str = "CONNECTION_METADATA/1.1";

/// Line delimiter.
pub const LINE_DELIM: u8 = b'\n';

/// Separator between key and value on an entry line.
pub const KV_DELIM: u8 = b'=';

/// Connection metadata carried in front of the proxied byte stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Header {
    /// Create an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous value for the key.
    ///
    /// Callers are expected to have checked the entry with [`validate_entry`];
    /// an unchecked key with `=` or `\n` produces a header that will not decode
    /// back to the same entries.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.entries.insert(key.into(), value.into())
    }

    /// Value bytes for a key.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&[u8]> {
        self.entries.get(key.as_ref()).map(Vec::as_slice)
    }

    /// Value for a key, if it is valid UTF-8.
    pub fn get_str(&self, key: impl AsRef<[u8]>) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Exact length in bytes of the encoded header.
    pub fn encoded_len(&self) -> usize {
        let entries: usize = self.entries.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
        MAGIC.len() + 1 + entries + 1
    }

    /// Serialize to wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC.as_bytes());
        out.push(LINE_DELIM);
        for (key, value) in &self.entries {
            out.extend_from_slice(key);
            out.push(KV_DELIM);
            out.extend_from_slice(value);
            out.push(LINE_DELIM);
        }
        out.push(LINE_DELIM);
        out
    }

    pub fn into_entries(self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.entries
    }
}

impl From<BTreeMap<Vec<u8>, Vec<u8>>> for Header {
    fn from(entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self { entries }
    }
}

impl From<&BTreeMap<String, String>> for Header {
    fn from(entries: &BTreeMap<String, String>) -> Self {
        entries
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Header
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (k, v) in iter {
            header.insert(k, v);
        }
        header
    }
}

/// Encode a set of entries. See [`Header::encode`].
pub fn encode<'a, I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    entries.into_iter().collect::<Header>().encode()
}

/// Check that a key/value pair can be encoded without changing meaning.
pub fn validate_entry(key: &[u8], value: &[u8]) -> Result<(), EntryError> {
    validate_key(key)?;
    validate_value(key, value)
}

/// A key must be non-empty and hold neither `=` nor a newline.
pub fn validate_key(key: &[u8]) -> Result<(), EntryError> {
    if key.is_empty() {
        return Err(EntryError::EmptyKey);
    }
    if key.contains(&KV_DELIM) {
        return Err(EntryError::KeyContainsSeparator(key.to_vec()));
    }
    if key.contains(&LINE_DELIM) {
        return Err(EntryError::KeyContainsNewline(key.to_vec()));
    }
    Ok(())
}

/// A value may hold any byte but a newline. `key` only labels the error.
pub fn validate_value(key: &[u8], value: &[u8]) -> Result<(), EntryError> {
    if value.contains(&LINE_DELIM) {
        return Err(EntryError::ValueContainsNewline(key.to_vec()));
    }
    Ok(())
}

/// Decode a header from the start of `buf`.
///
/// Returns the number of bytes the header occupies (magic line, entries and
/// terminator, delimiters included) and the decoded entries. Bytes after the
/// terminator are never inspected.
pub fn decode(buf: &[u8]) -> Result<(usize, Header), HeaderError> {
    let mut lines = Lines { buf, pos: 0 };

    let head = lines.next_line().ok_or(HeaderError::TruncatedHeader)?;
    if head != MAGIC.as_bytes() {
        return Err(HeaderError::BadMagic(head.to_vec()));
    }

    let mut header = Header::new();
    loop {
        let line = lines.next_line().ok_or(HeaderError::TruncatedHeader)?;
        if line.is_empty() {
            return Ok((lines.pos, header));
        }
        let (key, value) = split_entry(line)?;
        header.insert(key, value);
    }
}

/// Split `key=value...` on the first `=`; the rest of the line is the value.
pub(crate) fn split_entry(line: &[u8]) -> Result<(&[u8], &[u8]), HeaderError> {
    match line.iter().position(|&b| b == KV_DELIM) {
        Some(idx) => Ok((&line[..idx], &line[idx + 1..])),
        None => Err(HeaderError::InvalidEntryLine(line.to_vec())),
    }
}

/// Left-to-right line cursor that never looks past the next delimiter.
struct Lines<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    /// Next line with its delimiter stripped, or `None` if no delimiter remains.
    fn next_line(&mut self) -> Option<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        let idx = rest.iter().position(|&b| b == LINE_DELIM)?;
        self.pos += idx + 1;
        Some(&rest[..idx])
    }
}
