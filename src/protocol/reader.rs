//! Reading a header off a live stream.
//!
//! Destination services use this to strip the header from an accepted
//! connection. Reads go line by line through an [`AsyncBufRead`], so any
//! payload the peer sent right behind the terminator stays buffered in the
//! reader for the caller.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::protocol::error::HeaderError;
use crate::protocol::header::{split_entry, Header, LINE_DELIM, MAGIC};

/// Default cap on header size accepted by [`read_header`].
pub const DEFAULT_MAX_HEADER_LEN: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ReadHeaderError {
    #[error("failed to read header: {0}")]
    Io(#[from] std::io::Error),

    #[error("header exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Read one header from `reader`, returning its byte length and entries.
///
/// End of stream before the terminator is [`HeaderError::TruncatedHeader`].
pub async fn read_header<R>(reader: &mut R, max_len: usize) -> Result<(usize, Header), ReadHeaderError>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0;
    let mut line = Vec::new();

    read_line(reader, &mut line, &mut consumed, max_len).await?;
    if line != MAGIC.as_bytes() {
        return Err(HeaderError::BadMagic(line).into());
    }

    let mut header = Header::new();
    loop {
        read_line(reader, &mut line, &mut consumed, max_len).await?;
        if line.is_empty() {
            return Ok((consumed, header));
        }
        let (key, value) = split_entry(&line)?;
        header.insert(key, value);
    }
}

/// Read the next line into `line` with the delimiter stripped.
async fn read_line<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    consumed: &mut usize,
    max_len: usize,
) -> Result<(), ReadHeaderError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let remaining = max_len.saturating_sub(*consumed);
    // `take` keeps a peer that never sends a newline from growing the buffer.
    let mut limited = tokio::io::AsyncReadExt::take(&mut *reader, remaining as u64);
    let n = limited.read_until(LINE_DELIM, line).await?;
    *consumed += n;

    if line.last() != Some(&LINE_DELIM) {
        if n == remaining {
            return Err(ReadHeaderError::TooLarge { limit: max_len });
        }
        return Err(HeaderError::TruncatedHeader.into());
    }
    line.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn reads_header_and_leaves_payload() {
        let mut data = Header::from_iter([("tenant", "acme"), ("joe", "jane=jack")]).encode();
        let header_len = data.len();
        data.extend_from_slice(b"payload");

        let mut reader = BufReader::new(&data[..]);
        let (consumed, header) = read_header(&mut reader, DEFAULT_MAX_HEADER_LEN).await.unwrap();
        assert_eq!(consumed, header_len);
        assert_eq!(header.get_str("joe"), Some("jane=jack"));

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"payload");
    }

    #[tokio::test]
    async fn eof_before_terminator_is_truncated() {
        let mut reader = BufReader::new(&b"CONNECTION_METADATA/1.1\nfoo=bar\n"[..]);
        let err = read_header(&mut reader, DEFAULT_MAX_HEADER_LEN).await.unwrap_err();
        assert!(matches!(err, ReadHeaderError::Header(HeaderError::TruncatedHeader)));
    }

    #[tokio::test]
    async fn bad_magic_and_invalid_line() {
        let mut reader = BufReader::new(&b"HELLO\n\n"[..]);
        let err = read_header(&mut reader, DEFAULT_MAX_HEADER_LEN).await.unwrap_err();
        assert!(matches!(err, ReadHeaderError::Header(HeaderError::BadMagic(_))));

        let mut reader = BufReader::new(&b"CONNECTION_METADATA/1.1\nnope\n\n"[..]);
        let err = read_header(&mut reader, DEFAULT_MAX_HEADER_LEN).await.unwrap_err();
        assert!(matches!(err, ReadHeaderError::Header(HeaderError::InvalidEntryLine(_))));
    }

    #[tokio::test]
    async fn oversized_header_rejected() {
        let data = format!("CONNECTION_METADATA/1.1\nx={}\n\n", "y".repeat(100));
        let mut reader = BufReader::new(data.as_bytes());
        let err = read_header(&mut reader, 64).await.unwrap_err();
        assert!(matches!(err, ReadHeaderError::TooLarge { limit: 64 }));
    }
}
