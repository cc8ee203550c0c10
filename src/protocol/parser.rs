//! Incremental Header Parser
//!
//! Recognizes one command header line at a time from arbitrarily split
//! input. Partial lines are kept inside the parser, so the caller can discard
//! every byte it feeds in as soon as `parse` reports it consumed.
//!
//! ## How the Parser Works
//!
//! 1. `parse(buf)` consumes bytes up to and including the next `\n`. It
//!    returns `(true, consumed)` once a full line is in hand, or
//!    `(false, consumed)` if the line is still incomplete. `consumed == 0`
//!    only happens for empty input or while a recognized header is waiting
//!    to be built.
//! 2. `build()` turns the recognized line into a [`Command`] plus the length
//!    of the data block that follows it, if any.
//! 3. `reset()` readies the parser for the next header.
//!
//! The data block itself is not parsed here; the connection collects it.

use crate::commands::{Command, StoreMode};
use crate::protocol::types::{Response, MAX_KEY_LENGTH, MAX_LINE_LENGTH, MAX_VALUE_SIZE};
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors that can occur while building a command from a header line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `build` was called before a full line was parsed
    #[error("no complete command line")]
    Incomplete,

    /// The line held only whitespace
    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing key")]
    MissingKey,

    #[error("key too long: {len} bytes (max: {max})")]
    KeyTooLong { len: usize, max: usize },

    #[error("key contains control characters")]
    InvalidKey,

    #[error("missing value length")]
    MissingLength,

    #[error("invalid value length: {0}")]
    InvalidLength(String),

    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("line too long (max: {max})")]
    LineTooLong { max: usize },
}

impl ParseError {
    /// The response sent back to the client for this error.
    pub fn response(&self) -> Response {
        match self {
            ParseError::EmptyCommand | ParseError::UnknownCommand(_) => Response::Error,
            other => Response::client_error(other.to_string()),
        }
    }
}

/// Result type for building commands.
pub type ParseResult<T> = Result<T, ParseError>;

/// An incremental parser for request header lines.
///
/// # Example
///
/// ```
/// use shardcache::protocol::Parser;
///
/// let mut parser = Parser::new();
///
/// // A header split across two reads
/// assert_eq!(parser.parse(b"set name"), (false, 8));
/// assert_eq!(parser.parse(b" 5\r\nhello\r\n"), (true, 4));
///
/// let (command, value_len) = parser.build().unwrap();
/// assert_eq!(command.name(), "set");
/// assert_eq!(value_len, Some(5));
/// parser.reset();
/// ```
#[derive(Debug, Default)]
pub struct Parser {
    /// Header bytes seen so far, without the `\n`
    line: BytesMut,
    /// A full line has been recognized and awaits `build`
    complete: bool,
    /// The line outgrew [`MAX_LINE_LENGTH`]; its bytes are being discarded
    overflow: bool,
    /// Data block length announced by the last built header
    data_len: Option<usize>,
}

impl Parser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes to the parser.
    ///
    /// # Returns
    ///
    /// `(recognized, consumed)`: whether a full header line is now available,
    /// and how many bytes from the front of `buf` the caller may discard.
    pub fn parse(&mut self, buf: &[u8]) -> (bool, usize) {
        if self.complete {
            return (true, 0);
        }

        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.append(&buf[..pos]);
                self.complete = true;
                (true, pos + 1)
            }
            None => {
                self.append(buf);
                (false, buf.len())
            }
        }
    }

    /// Materializes the command for the most recently recognized line.
    ///
    /// # Returns
    ///
    /// The command and, for storage commands, the length of the data block
    /// that follows the header (excluding its CRLF).
    pub fn build(&mut self) -> ParseResult<(Command, Option<usize>)> {
        if !self.complete {
            return Err(ParseError::Incomplete);
        }
        if self.overflow {
            return Err(ParseError::LineTooLong {
                max: MAX_LINE_LENGTH,
            });
        }

        let line = match self.line.last() {
            Some(b'\r') => &self.line[..self.line.len() - 1],
            _ => &self.line[..],
        };

        let mut tokens = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty());

        let name = tokens.next().ok_or(ParseError::EmptyCommand)?;
        let name = name.to_ascii_lowercase();

        let mode = match name.as_slice() {
            b"get" | b"gets" => {
                let keys = tokens.map(parse_key).collect::<ParseResult<Vec<_>>>()?;
                if keys.is_empty() {
                    return Err(ParseError::MissingKey);
                }
                return Ok((Command::Get { keys }, None));
            }
            b"delete" => {
                let key = parse_key(tokens.next().ok_or(ParseError::MissingKey)?)?;
                expect_end(tokens)?;
                return Ok((Command::Delete { key }, None));
            }
            b"set" => StoreMode::Set,
            b"add" => StoreMode::Add,
            b"replace" => StoreMode::Replace,
            b"append" => StoreMode::Append,
            b"prepend" => StoreMode::Prepend,
            _ => {
                return Err(ParseError::UnknownCommand(
                    String::from_utf8_lossy(&name).into_owned(),
                ))
            }
        };

        let key = tokens.next().ok_or(ParseError::MissingKey)?;
        let len = tokens.next().ok_or(ParseError::MissingLength)?;

        // Once the length is known, the data block follows even if the rest
        // of the header is rejected.
        let len = match parse_length(len) {
            Ok(len) => len,
            Err(e) => {
                if let ParseError::ValueTooLarge { size, .. } = e {
                    self.data_len = Some(size);
                }
                return Err(e);
            }
        };
        self.data_len = Some(len);

        let key = parse_key(key)?;
        expect_end(tokens)?;

        Ok((Command::Store { mode, key, len }, Some(len)))
    }

    /// Length of the data block announced by the last built header.
    ///
    /// Set whenever the length token was readable, including when `build`
    /// rejected the header for another reason, so the caller knows how many
    /// bytes to discard.
    pub fn data_len(&self) -> Option<usize> {
        self.data_len
    }

    /// Clears all state for the next header.
    pub fn reset(&mut self) {
        self.line.clear();
        self.complete = false;
        self.overflow = false;
        self.data_len = None;
    }

    fn append(&mut self, chunk: &[u8]) {
        if self.overflow {
            return;
        }
        if self.line.len() + chunk.len() > MAX_LINE_LENGTH {
            self.overflow = true;
            self.line.clear();
            return;
        }
        self.line.extend_from_slice(chunk);
    }
}

fn parse_key(token: &[u8]) -> ParseResult<Bytes> {
    if token.len() > MAX_KEY_LENGTH {
        return Err(ParseError::KeyTooLong {
            len: token.len(),
            max: MAX_KEY_LENGTH,
        });
    }
    if token.iter().any(|b| b.is_ascii_control()) {
        return Err(ParseError::InvalidKey);
    }
    Ok(Bytes::copy_from_slice(token))
}

fn parse_length(token: &[u8]) -> ParseResult<usize> {
    let text = String::from_utf8_lossy(token);
    let len: usize = text
        .parse()
        .map_err(|_| ParseError::InvalidLength(text.clone().into_owned()))?;
    if len > MAX_VALUE_SIZE {
        return Err(ParseError::ValueTooLarge {
            size: len,
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(len)
}

fn expect_end<'a>(mut tokens: impl Iterator<Item = &'a [u8]>) -> ParseResult<()> {
    match tokens.next() {
        Some(extra) => Err(ParseError::UnexpectedArgument(
            String::from_utf8_lossy(extra).into_owned(),
        )),
        None => Ok(()),
    }
}
