//! Connection Module
//!
//! Per-client protocol sessions and the tokio driver that runs them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + spawn
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  driver: await readiness for conn.interest()                │
//! │                                                             │
//! │     readable ──> do_read()       writable ──> do_write()    │
//! │     hangup   ──> on_close()      error    ──> on_error()    │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Connection: read buffer ─> Parser ─> Command::execute      │
//! │              ─> output queue (one vectored write per pass)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Non-blocking**: callbacks never wait; they drain until would-block
//! - **Pipelining**: any number of requests per read, answered in order
//! - **Backpressure**: input stalls while 100 responses are unsent
//! - **Statistics**: tracks connection and command metrics
//!
//! ## Example
//!
//! ```no_run
//! use shardcache::connection::{handle_connection, ConnectionStats, ReactorMode};
//! use shardcache::storage::{Storage, StripedLru};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn serve() -> anyhow::Result<()> {
//! let storage: Arc<dyn Storage> = Arc::new(StripedLru::new(4, 64 * 1024 * 1024)?);
//! let stats = Arc::new(ConnectionStats::new());
//! let listener = TcpListener::bind("127.0.0.1:11211").await?;
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(
//!     stream,
//!     addr,
//!     Arc::clone(&storage),
//!     Arc::clone(&stats),
//!     ReactorMode::MultiThreaded,
//! ));
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod handler;
pub mod interest;

// Re-export commonly used types
pub use driver::{drive, handle_connection};
pub use handler::{
    Connection, ConnectionError, ConnectionStats, Lifecycle, ReactorMode, Socket,
    MAX_IOVECS, MAX_OUTPUT_QUEUE, READ_BUFFER_SIZE,
};
pub use interest::Interest;
