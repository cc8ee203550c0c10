//! Readiness Driver
//!
//! Runs one [`Connection`] to completion on the tokio reactor. Each pass
//! awaits readiness for whatever the connection asked for, then dispatches to
//! its callbacks. tokio readiness is edge-triggered, so every callback drains
//! the socket until it would block, and the driver re-reads the connection's
//! interest after each one.

use super::handler::{Connection, ConnectionError, ConnectionStats, ReactorMode};
use super::interest::Interest;
use crate::storage::Storage;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Handles a client connection.
///
/// Creates the [`Connection`], drives it until it dies, and logs how it
/// ended. The socket is closed when this returns.
///
/// # Arguments
///
/// * `stream` - The accepted TCP stream
/// * `addr` - The client's socket address
/// * `storage` - The cache shared by all connections
/// * `stats` - Shared connection statistics
/// * `mode` - How the runtime schedules connection tasks
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    storage: Arc<dyn Storage>,
    stats: Arc<ConnectionStats>,
    mode: ReactorMode,
) {
    info!(client = %addr, "Client connected");

    let mut conn = Connection::new(stream, addr, storage, stats, mode);
    match drive(&mut conn).await {
        Ok(()) => info!(client = %addr, "Client disconnected"),
        Err(ConnectionError::Io(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
            debug!(client = %addr, "Connection reset by client")
        }
        Err(e) => warn!(client = %addr, error = %e, "Connection error"),
    }
}

/// Drives a started connection until it is no longer alive.
pub async fn drive(conn: &mut Connection<TcpStream>) -> Result<(), ConnectionError> {
    conn.start();

    while conn.is_alive() {
        // Input left in the buffer when backpressure lifted will not raise
        // another readiness event.
        if conn.is_stalled() {
            conn.do_read()?;
            continue;
        }

        let Some(interest) = conn.interest().to_tokio() else {
            debug!(client = %conn.peer(), "Connection has no interest left");
            break;
        };

        let ready = match conn.socket().ready(interest).await {
            Ok(ready) => ready,
            Err(e) => {
                conn.on_error();
                return Err(e.into());
            }
        };
        trace!(client = %conn.peer(), ?ready, "Socket ready");

        if ready.is_writable() {
            conn.do_write()?;
        }
        if ready.is_readable() && conn.interest().contains(Interest::READABLE) {
            conn.do_read()?;
        }
        // Hangup: nothing queued can be delivered any more
        if ready.is_write_closed() {
            conn.on_close();
        }
    }

    Ok(())
}
