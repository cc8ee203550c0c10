//! # shardcache - An In-Memory, memcached-style LRU Cache Server
//!
//! shardcache speaks a subset of the memcached text protocol over TCP and
//! keeps every entry in memory, evicting the least recently used entries
//! once a fixed byte budget is reached.
//!
//! ## Features
//!
//! - **memcached-Compatible**: `get`, `set`, `add`, `replace`, `append`,
//!   `prepend` and `delete` over the text protocol
//! - **Bounded**: strict LRU eviction against a per-shard byte budget
//! - **Sharded**: keys hash onto independent mutex-guarded shards
//! - **Non-blocking I/O**: readiness-driven connections on Tokio, with
//!   pipelining and output backpressure
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             shardcache                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │ (per task)  │    │  execute    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Text      │    │                StripedLru                    │   │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │ Mutex  │ │ Mutex  │ │ Mutex  │ │shards  │ │   │
//! │                     │  │  LRU   │ │  LRU   │ │  LRU   │ │        │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use shardcache::connection::ReactorMode;
//! use shardcache::server::Server;
//! use shardcache::storage::{Storage, StripedLru};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Four shards sharing a 64 MiB budget
//!     let storage: Arc<dyn Storage> = Arc::new(StripedLru::new(4, 64 * 1024 * 1024)?);
//!
//!     let server = Server::bind("127.0.0.1:11211", storage, ReactorMode::MultiThreaded).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Incremental text-protocol parser and responses
//! - [`storage`]: Bounded LRU, its mutex guard and the shard router
//! - [`commands`]: Parsed commands and their execution against storage
//! - [`connection`]: Per-client state machine and its Tokio driver
//! - [`server`]: Listener and accept loop
//! - [`config`]: Command-line configuration
//!
//! ## Design Highlights
//!
//! ### Arena LRU
//!
//! Each shard keeps its entries in a slot arena linked into a
//! least-to-most-recently-used list, indexed by a hash map of slot handles.
//! Every hit or update moves the entry to the tail; eviction pops the head.
//!
//! ### Zero-Copy Values
//!
//! Keys, values and queued responses are `bytes::Bytes`, so a `get` hands
//! out a reference-counted view of the stored value instead of a copy.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::Command;
pub use config::{ConfigError, ServerConfig};
pub use connection::{handle_connection, Connection, ConnectionStats, ReactorMode};
pub use protocol::{ParseError, Parser, Response};
pub use server::Server;
pub use storage::{GuardedLru, SimpleLru, Storage, StorageError, StripedLru};

/// The default port shardcache listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host shardcache binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of shardcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
