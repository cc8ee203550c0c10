//! Command Module
//!
//! Command objects built by the [`Parser`](crate::protocol::Parser) and
//! executed against a [`Storage`](crate::storage::Storage).
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │     Parser      │  (protocol module)
//! └────────┬────────┘
//!          │ build()
//!          ▼
//! ┌─────────────────┐
//! │    Command      │  (this module)
//! │                 │
//! │  - execute()    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Storage      │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! | Command   | Storage operation | Responses                  |
//! |-----------|-------------------|----------------------------|
//! | `set`     | `put`             | `STORED`                   |
//! | `add`     | `put_if_absent`   | `STORED` / `NOT_STORED`    |
//! | `replace` | `set`             | `STORED` / `NOT_STORED`    |
//! | `append`  | `get` + `set`     | `STORED` / `NOT_STORED`    |
//! | `prepend` | `get` + `set`     | `STORED` / `NOT_STORED`    |
//! | `get`     | `get`             | `VALUE ...` blocks + `END` |
//! | `delete`  | `delete`          | `DELETED` / `NOT_FOUND`    |

pub mod command;

// Re-export the command types
pub use command::{Command, StoreMode};
