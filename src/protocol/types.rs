//! Text Protocol Types
//!
//! Constants and response values for the memcached-style text protocol.
//!
//! ## Protocol Format
//!
//! Requests are a header line, optionally followed by a data block whose
//! length the header announces:
//!
//! ```text
//! set <key> <bytes>\r\n<data>\r\n
//! get <key> [<key> ...]\r\n
//! delete <key>\r\n
//! ```
//!
//! Responses are a single line. The connection appends the final CRLF, so
//! [`Response::serialize`] leaves it off:
//!
//! ```text
//! STORED
//! VALUE <key> 0 <bytes>\r\n<data>\r\nEND
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// The CRLF terminator ending every line and data block
pub const CRLF: &[u8] = b"\r\n";

/// Longest key accepted (same as memcached)
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value accepted in a single data block (1 MiB)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Longest header line accepted, excluding the terminator
pub const MAX_LINE_LENGTH: usize = 2048;

/// The result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `STORED`
    Stored,
    /// `NOT_STORED`
    NotStored,
    /// `DELETED`
    Deleted,
    /// `NOT_FOUND`
    NotFound,
    /// Zero or more `VALUE` blocks followed by `END`
    Values(Vec<(Bytes, Bytes)>),
    /// `ERROR`, for unknown or empty commands
    Error,
    /// `CLIENT_ERROR <message>`, for malformed requests
    ClientError(String),
}

impl Response {
    pub fn client_error(msg: impl Into<String>) -> Self {
        Response::ClientError(msg.into())
    }

    /// Serializes the response without its final CRLF.
    pub fn serialize(&self) -> BytesMut {
        match self {
            Response::Stored => BytesMut::from(&b"STORED"[..]),
            Response::NotStored => BytesMut::from(&b"NOT_STORED"[..]),
            Response::Deleted => BytesMut::from(&b"DELETED"[..]),
            Response::NotFound => BytesMut::from(&b"NOT_FOUND"[..]),
            Response::Error => BytesMut::from(&b"ERROR"[..]),
            Response::ClientError(msg) => {
                let mut buf = BytesMut::with_capacity(13 + msg.len());
                buf.put_slice(b"CLIENT_ERROR ");
                buf.put_slice(msg.as_bytes());
                buf
            }
            Response::Values(values) => {
                let capacity = values
                    .iter()
                    .map(|(k, v)| k.len() + v.len() + 32)
                    .sum::<usize>()
                    + 3;
                let mut buf = BytesMut::with_capacity(capacity);
                for (key, value) in values {
                    buf.put_slice(b"VALUE ");
                    buf.put_slice(key);
                    buf.put_slice(format!(" 0 {}", value.len()).as_bytes());
                    buf.put_slice(CRLF);
                    buf.put_slice(value);
                    buf.put_slice(CRLF);
                }
                buf.put_slice(b"END");
                buf
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.serialize()))
    }
}
