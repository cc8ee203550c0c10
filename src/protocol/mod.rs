//! Text Protocol Implementation
//!
//! A memcached-style, line-oriented request/response protocol.
//!
//! ## Modules
//!
//! - `types`: Response values, limits and serialization
//! - `parser`: Incremental parser turning header lines into commands
//!
//! ## Example
//!
//! ```
//! use shardcache::protocol::{Parser, Response};
//!
//! let mut parser = Parser::new();
//! let (recognized, consumed) = parser.parse(b"delete name\r\n");
//! assert!(recognized);
//! assert_eq!(consumed, 13);
//!
//! let (command, value_len) = parser.build().unwrap();
//! assert_eq!(command.name(), "delete");
//! assert_eq!(value_len, None);
//!
//! // Responses are serialized without their final CRLF
//! assert_eq!(&Response::Deleted.serialize()[..], b"DELETED");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{ParseError, ParseResult, Parser};
pub use types::{Response, CRLF, MAX_KEY_LENGTH, MAX_LINE_LENGTH, MAX_VALUE_SIZE};
