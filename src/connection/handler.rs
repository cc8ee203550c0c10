//! Connection State Machine
//!
//! One [`Connection`] per client socket. The reactor never reads or writes
//! the socket itself: it watches readiness for whatever [`Interest`] the
//! connection currently asks for and calls back into it.
//!
//! ## Command Cycle
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │
//!   ┌─────────────────┐  header   ┌───────────────────────┐
//!   │     Parsing     │──────────>│ Accumulating argument │
//!   └────────┬────────┘  (+data)  └───────────┬───────────┘
//!            │ header                          │ owed == 0
//!            │ (no data)                       ▼
//!            │                      ┌───────────────────────┐
//!            └─────────────────────>│  Ready: execute and   │
//!                                   │  queue the response   │
//!                                   └───────────────────────┘
//! ```
//!
//! A storage header rejected after its length was read still has its data
//! block discarded, so the block is never parsed as requests.
//!
//! ## Lifecycle
//!
//! `Open` until the peer ends its write side, then `ReadEnded` while queued
//! responses drain, then `Dead`. Errors and hangups go straight to `Dead`.
//!
//! ## Backpressure
//!
//! Once [`MAX_OUTPUT_QUEUE`] responses are waiting to be sent, the connection
//! stops processing input and withdraws read interest. Draining the queue
//! below the limit restores it, and [`Connection::is_stalled`] tells the
//! reactor that input is already buffered and should be processed without
//! waiting for the socket.

use super::interest::Interest;
use crate::commands::Command;
use crate::protocol::{Parser, Response, CRLF};
use crate::storage::Storage;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Capacity of the per-connection read buffer
pub const READ_BUFFER_SIZE: usize = 4096;

/// Queued responses at which input processing stalls
pub const MAX_OUTPUT_QUEUE: usize = 100;

/// Most buffers handed to a single vectored write
pub const MAX_IOVECS: usize = 1024;

/// Non-blocking socket operations the connection needs.
///
/// Both calls must return [`io::ErrorKind::WouldBlock`] instead of waiting.
pub trait Socket {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;
}

impl Socket for TcpStream {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf)
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.try_write_vectored(bufs)
    }
}

/// How the reactor schedules connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactorMode {
    /// Every connection is driven from one thread
    SingleThreaded,
    /// Connections may move between worker threads between callbacks
    #[default]
    MultiThreaded,
}

/// Where the connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    /// The peer closed its write side; queued responses are still sent
    ReadEnded,
    Dead,
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The read buffer filled up without any of it being consumable
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Protocol session for one client socket.
pub struct Connection<S> {
    socket: S,
    peer: SocketAddr,
    mode: ReactorMode,

    /// The cache shared by all connections
    storage: Arc<dyn Storage>,
    stats: Arc<ConnectionStats>,

    interest: Interest,
    lifecycle: Lifecycle,

    read_buf: Box<[u8]>,
    read_len: usize,

    parser: Parser,
    /// Command whose header has been built but which has not run yet
    command: Option<Command>,
    /// Argument bytes (data block plus CRLF) still to be read
    arg_remains: usize,
    argument: BytesMut,
    /// Data block bytes of a rejected header still to be discarded
    skip_remains: usize,

    output: VecDeque<Bytes>,
    /// Bytes of the front response already sent
    head_offset: usize,

    /// Processing stopped on backpressure with input possibly left over
    stalled: bool,
}

impl<S: Socket> Connection<S> {
    /// Creates a connection around an accepted, non-blocking socket.
    ///
    /// Nothing is requested from the reactor until [`start`](Self::start).
    pub fn new(
        socket: S,
        peer: SocketAddr,
        storage: Arc<dyn Storage>,
        stats: Arc<ConnectionStats>,
        mode: ReactorMode,
    ) -> Self {
        stats.connection_opened();

        Self {
            socket,
            peer,
            mode,
            storage,
            stats,
            interest: Interest::NONE,
            lifecycle: Lifecycle::Open,
            read_buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            read_len: 0,
            parser: Parser::new(),
            command: None,
            arg_remains: 0,
            argument: BytesMut::new(),
            skip_remains: 0,
            output: VecDeque::new(),
            head_offset: 0,
            stalled: false,
        }
    }

    /// Registers initial interest: readable, error and hangup.
    pub fn start(&mut self) {
        self.interest = Interest::READABLE | Interest::ERROR | Interest::HANGUP | self.edge();
        trace!(client = %self.peer, interest = ?self.interest, "Connection started");
    }

    /// Called when the socket is readable.
    ///
    /// Processes whatever is already buffered, then keeps reading and
    /// processing until the socket would block, the peer ends the stream,
    /// or backpressure stops processing.
    pub fn do_read(&mut self) -> Result<(), ConnectionError> {
        if self.lifecycle != Lifecycle::Open {
            return Ok(());
        }
        self.stalled = false;

        loop {
            self.process_input();

            if self.is_backpressured() {
                trace!(
                    client = %self.peer,
                    queued = self.output.len(),
                    buffered = self.read_len,
                    "Output queue full, stalling input"
                );
                self.stalled = true;
                return Ok(());
            }

            if self.read_len == self.read_buf.len() {
                self.lifecycle = Lifecycle::Dead;
                return Err(ConnectionError::BufferFull);
            }

            match self.socket.recv(&mut self.read_buf[self.read_len..]) {
                Ok(0) => {
                    self.interest.remove(Interest::READABLE);
                    self.lifecycle = if self.output.is_empty() {
                        Lifecycle::Dead
                    } else {
                        Lifecycle::ReadEnded
                    };
                    debug!(
                        client = %self.peer,
                        pending = self.output.len(),
                        "Peer closed its write side"
                    );
                    return Ok(());
                }
                Ok(n) => {
                    self.read_len += n;
                    self.stats.bytes_read(n);
                    trace!(client = %self.peer, bytes = n, "Read data");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.lifecycle = Lifecycle::Dead;
                    return Err(e.into());
                }
            }
        }
    }

    /// Called when the socket is writable.
    ///
    /// Sends as much of the output queue as the socket takes in one
    /// vectored write.
    pub fn do_write(&mut self) -> Result<(), ConnectionError> {
        if self.output.is_empty() {
            return Ok(());
        }

        let mut slices = Vec::with_capacity(self.output.len().min(MAX_IOVECS));
        for (i, message) in self.output.iter().take(MAX_IOVECS).enumerate() {
            let start = if i == 0 { self.head_offset } else { 0 };
            slices.push(IoSlice::new(&message[start..]));
        }

        let written = match self.socket.send_vectored(&slices) {
            Ok(0) => {
                self.lifecycle = Lifecycle::Dead;
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                        | io::ErrorKind::BrokenPipe
                ) =>
            {
                trace!(client = %self.peer, error = %e, "Write deferred");
                return Ok(());
            }
            Err(e) => {
                self.lifecycle = Lifecycle::Dead;
                return Err(e.into());
            }
        };
        drop(slices);

        self.stats.bytes_written(written);
        self.advance_output(written);
        trace!(
            client = %self.peer,
            bytes = written,
            queued = self.output.len(),
            "Sent responses"
        );

        if self.lifecycle == Lifecycle::Open
            && !self.interest.contains(Interest::READABLE)
            && !self.is_backpressured()
        {
            self.interest.insert(Interest::READABLE);
        }

        if self.output.is_empty() {
            self.interest.remove(Interest::WRITABLE);
            if self.lifecycle == Lifecycle::ReadEnded {
                self.lifecycle = Lifecycle::Dead;
            }
        }

        Ok(())
    }

    /// Called when the reactor reports an error on the socket.
    pub fn on_error(&mut self) {
        self.lifecycle = Lifecycle::Dead;
    }

    /// Called when the reactor reports a hangup.
    pub fn on_close(&mut self) {
        self.lifecycle = Lifecycle::Dead;
    }

    pub fn is_alive(&self) -> bool {
        self.lifecycle != Lifecycle::Dead
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The events this connection wants to be woken for next.
    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Returns true if backpressure stopped processing and has since been
    /// lifted, so buffered input should be handled without waiting for the
    /// socket to become readable again.
    pub fn is_stalled(&self) -> bool {
        self.stalled && self.interest.contains(Interest::READABLE)
    }

    /// Number of responses waiting to be sent.
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    #[cfg(test)]
    pub(crate) fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    fn edge(&self) -> Interest {
        match self.mode {
            ReactorMode::SingleThreaded => Interest::NONE,
            ReactorMode::MultiThreaded => Interest::EDGE,
        }
    }

    fn is_backpressured(&self) -> bool {
        self.output.len() >= MAX_OUTPUT_QUEUE
    }

    /// Runs buffered input through the command cycle until it runs out or
    /// the output queue fills.
    fn process_input(&mut self) {
        while !self.is_backpressured() {
            if self.command.is_some() && self.arg_remains == 0 {
                self.execute_command();
                continue;
            }
            if self.read_len == 0 {
                break;
            }

            if self.skip_remains > 0 {
                let take = self.skip_remains.min(self.read_len);
                self.consume(take);
                self.skip_remains -= take;
                continue;
            }

            if self.command.is_some() {
                let take = self.arg_remains.min(self.read_len);
                self.argument.extend_from_slice(&self.read_buf[..take]);
                self.consume(take);
                self.arg_remains -= take;
                continue;
            }

            let (recognized, consumed) = self.parser.parse(&self.read_buf[..self.read_len]);
            self.consume(consumed);

            if recognized {
                match self.parser.build() {
                    Ok((command, value_len)) => {
                        trace!(client = %self.peer, command = command.name(), "Parsed command");
                        if let Some(len) = value_len {
                            self.arg_remains = len + CRLF.len();
                            self.argument.reserve(self.arg_remains);
                        }
                        self.command = Some(command);
                    }
                    Err(e) => {
                        debug!(client = %self.peer, error = %e, "Rejected request");
                        if let Some(len) = self.parser.data_len() {
                            self.skip_remains = len.saturating_add(CRLF.len());
                        }
                        self.parser.reset();
                        self.enqueue(e.response());
                    }
                }
            } else if consumed == 0 {
                break;
            }
        }
    }

    fn execute_command(&mut self) {
        let Some(command) = self.command.take() else {
            return;
        };
        let mut argument = self.argument.split();

        let response = match command.value_len() {
            Some(_) if !argument.ends_with(CRLF) => {
                debug!(client = %self.peer, command = command.name(), "Bad data chunk");
                Response::client_error("bad data chunk")
            }
            Some(len) => {
                argument.truncate(len);
                command.execute(&*self.storage, argument.freeze())
            }
            None => command.execute(&*self.storage, Bytes::new()),
        };

        self.parser.reset();
        self.stats.command_processed();
        self.enqueue(response);
    }

    fn enqueue(&mut self, response: Response) {
        let mut message = response.serialize();
        message.extend_from_slice(CRLF);
        self.output.push_back(message.freeze());
        self.interest.insert(Interest::WRITABLE);

        if self.is_backpressured() {
            self.interest =
                Interest::WRITABLE | Interest::ERROR | Interest::HANGUP | self.edge();
        }
    }

    fn consume(&mut self, n: usize) {
        self.read_buf.copy_within(n..self.read_len, 0);
        self.read_len -= n;
    }

    fn advance_output(&mut self, mut written: usize) {
        while let Some(front) = self.output.front() {
            let left = front.len() - self.head_offset;
            if written < left {
                self.head_offset += written;
                break;
            }
            written -= left;
            self.head_offset = 0;
            self.output.pop_front();
        }
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        self.stats.connection_closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_VALUE_SIZE;
    use crate::storage::GuardedLru;
    use tokio_test::{assert_err, assert_ok};

    /// A socket that replays scripted reads and write budgets.
    ///
    /// An exhausted read script means would-block; `Ok(vec![])` is
    /// end-of-stream. An exhausted write script accepts everything.
    #[derive(Default)]
    struct MockSocket {
        reads: VecDeque<io::Result<Vec<u8>>>,
        writes: VecDeque<io::Result<usize>>,
        written: Vec<u8>,
    }

    impl MockSocket {
        fn feed(&mut self, data: &[u8]) {
            self.reads.push_back(Ok(data.to_vec()));
        }

        fn take_written(&mut self) -> String {
            String::from_utf8_lossy(&std::mem::take(&mut self.written)).into_owned()
        }
    }

    impl Socket for MockSocket {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                None => Err(io::ErrorKind::WouldBlock.into()),
                Some(Err(e)) => Err(e),
                Some(Ok(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.reads.push_front(Ok(data.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }

        fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
            let mut budget = match self.writes.pop_front() {
                None => usize::MAX,
                Some(Err(e)) => return Err(e),
                Some(Ok(n)) => n,
            };
            let mut total = 0;
            for buf in bufs {
                let n = buf.len().min(budget);
                self.written.extend_from_slice(&buf[..n]);
                total += n;
                budget -= n;
                if budget == 0 {
                    break;
                }
            }
            Ok(total)
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn connection(mode: ReactorMode) -> (Connection<MockSocket>, Arc<ConnectionStats>) {
        let storage: Arc<dyn Storage> = Arc::new(GuardedLru::new(1024 * 1024));
        let stats = Arc::new(ConnectionStats::new());
        let mut conn = Connection::new(
            MockSocket::default(),
            peer(),
            storage,
            Arc::clone(&stats),
            mode,
        );
        conn.start();
        (conn, stats)
    }

    fn open() -> Connection<MockSocket> {
        connection(ReactorMode::SingleThreaded).0
    }

    #[test]
    fn test_start_interest() {
        let (conn, _) = connection(ReactorMode::SingleThreaded);
        assert_eq!(
            conn.interest(),
            Interest::READABLE | Interest::ERROR | Interest::HANGUP
        );

        let (conn, _) = connection(ReactorMode::MultiThreaded);
        assert_eq!(
            conn.interest(),
            Interest::READABLE | Interest::ERROR | Interest::HANGUP | Interest::EDGE
        );
        assert!(conn.is_alive());
        assert_eq!(conn.lifecycle(), Lifecycle::Open);
    }

    #[test]
    fn test_get_split_across_reads() {
        let mut conn = open();

        conn.socket_mut().feed(b"GET mis");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 0);
        assert!(!conn.interest().contains(Interest::WRITABLE));

        conn.socket_mut().feed(b"sing-key\r\n");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 1);
        assert!(conn.interest().contains(Interest::WRITABLE));

        assert_ok!(conn.do_write());
        assert_eq!(conn.socket_mut().take_written(), "END\r\n");
        assert!(!conn.interest().contains(Interest::WRITABLE));
        assert!(conn.interest().contains(Interest::READABLE));
    }

    #[test]
    fn test_pipelined_commands() {
        let mut conn = open();

        conn.socket_mut()
            .feed(b"set a 1\r\nx\r\nget a\r\ndelete a\r\nget a\r\ndelete a\r\n");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 5);

        assert_ok!(conn.do_write());
        assert_eq!(
            conn.socket_mut().take_written(),
            "STORED\r\nVALUE a 0 1\r\nx\r\nEND\r\nDELETED\r\nEND\r\nNOT_FOUND\r\n"
        );
    }

    #[test]
    fn test_value_split_across_reads() {
        let mut conn = open();

        conn.socket_mut().feed(b"set greeting 11\r\nhello");
        assert_ok!(conn.do_read());
        conn.socket_mut().feed(b" world\r");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 0);

        conn.socket_mut().feed(b"\nget greeting\r\n");
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());
        assert_eq!(
            conn.socket_mut().take_written(),
            "STORED\r\nVALUE greeting 0 11\r\nhello world\r\nEND\r\n"
        );
    }

    #[test]
    fn test_binary_value_with_crlf() {
        let mut conn = open();

        conn.socket_mut().feed(b"set bin 4\r\n\r\n\r\n\r\nget bin\r\n");
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());
        assert_eq!(
            conn.socket_mut().take_written(),
            "STORED\r\nVALUE bin 0 4\r\n\r\n\r\n\r\nEND\r\n"
        );
    }

    #[test]
    fn test_bad_data_chunk() {
        let mut conn = open();

        conn.socket_mut().feed(b"set k 3\r\nabcd\r\nget k\r\n");
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());

        // The trailing "\n" is then read as an empty command line
        assert_eq!(
            conn.socket_mut().take_written(),
            "CLIENT_ERROR bad data chunk\r\nERROR\r\nEND\r\n"
        );
        assert!(conn.is_alive());
    }

    #[test]
    fn test_errors_keep_session_open() {
        let mut conn = open();

        conn.socket_mut()
            .feed(b"bogus\r\nset k nope\r\nget\r\nset k 1\r\nv\r\nget k\r\n");
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());

        let written = conn.socket_mut().take_written();
        let lines: Vec<&str> = written.split("\r\n").collect();
        assert_eq!(lines[0], "ERROR");
        assert!(lines[1].starts_with("CLIENT_ERROR "));
        assert!(lines[2].starts_with("CLIENT_ERROR "));
        assert_eq!(lines[3], "STORED");
        assert_eq!(&lines[4..7], &["VALUE k 0 1", "v", "END"]);
        assert!(conn.is_alive());
    }

    #[test]
    fn test_rejected_header_discards_data_block() {
        let mut conn = open();

        conn.socket_mut().feed(b"set victim 1\r\nv\r\n");
        conn.socket_mut()
            .feed(format!("set big {}\r\ndelete victim\r\n", MAX_VALUE_SIZE + 1).as_bytes());
        assert_ok!(conn.do_read());

        // The rest of the oversized block arrives later, split across reads
        let rest = MAX_VALUE_SIZE + 1 - b"delete victim\r\n".len();
        conn.socket_mut().feed(&vec![b'x'; rest]);
        conn.socket_mut().feed(b"\r\nset k 1 extra\r\nz\r\nget victim k\r\n");
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());

        let written = conn.socket_mut().take_written();
        let lines: Vec<&str> = written.split("\r\n").collect();
        assert_eq!(lines[0], "STORED");
        assert!(lines[1].starts_with("CLIENT_ERROR value too large"));
        assert!(lines[2].starts_with("CLIENT_ERROR unexpected argument"));
        assert_eq!(&lines[3..], &["VALUE victim 0 1", "v", "END", ""]);
        assert_eq!(conn.pending_output(), 0);
        assert!(conn.is_alive());
    }

    #[test]
    fn test_add_replace_append_prepend() {
        let mut conn = open();

        conn.socket_mut().feed(
            b"replace k 1\r\na\r\nadd k 1\r\nb\r\nadd k 1\r\nc\r\n\
              append k 2\r\nyz\r\nprepend k 2\r\nwx\r\nget k\r\n",
        );
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());
        assert_eq!(
            conn.socket_mut().take_written(),
            "NOT_STORED\r\nSTORED\r\nNOT_STORED\r\nSTORED\r\nSTORED\r\n\
             VALUE k 0 5\r\nwxbyz\r\nEND\r\n"
        );
    }

    #[test]
    fn test_backpressure_round_trip() {
        let (mut conn, stats) = connection(ReactorMode::MultiThreaded);

        conn.socket_mut().feed(&b"get k\r\n".repeat(150));
        assert_ok!(conn.do_read());

        assert_eq!(conn.pending_output(), MAX_OUTPUT_QUEUE);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 100);
        assert_eq!(
            conn.interest(),
            Interest::WRITABLE | Interest::ERROR | Interest::HANGUP | Interest::EDGE
        );
        assert!(!conn.is_stalled());

        // Reading while backpressured makes no progress
        assert_ok!(conn.do_read());
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 100);

        // Sending one response lifts backpressure
        conn.socket_mut().writes.push_back(Ok(5));
        assert_ok!(conn.do_write());
        assert_eq!(conn.pending_output(), 99);
        assert!(conn.interest().contains(Interest::READABLE));
        assert!(conn.is_stalled());

        assert_ok!(conn.do_read());
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 101);
        assert_eq!(conn.pending_output(), MAX_OUTPUT_QUEUE);
        assert!(!conn.interest().contains(Interest::READABLE));

        assert_ok!(conn.do_write());
        assert_eq!(conn.pending_output(), 0);
        assert!(conn.is_stalled());
        assert!(!conn.interest().contains(Interest::WRITABLE));

        assert_ok!(conn.do_read());
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 150);
        assert!(!conn.is_stalled());

        assert_ok!(conn.do_write());
        assert_eq!(conn.socket_mut().take_written(), "END\r\n".repeat(150));
    }

    #[test]
    fn test_partial_write_resumes() {
        let mut conn = open();

        conn.socket_mut().feed(b"set k 5\r\nhello\r\nget k\r\n");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 2);

        conn.socket_mut().writes.extend([Ok(3), Ok(10)]);
        assert_ok!(conn.do_write());
        assert_eq!(conn.pending_output(), 2);
        assert_ok!(conn.do_write());
        assert_eq!(conn.pending_output(), 1);
        assert!(conn.interest().contains(Interest::WRITABLE));
        assert_ok!(conn.do_write());
        assert_eq!(conn.pending_output(), 0);

        assert_eq!(
            conn.socket_mut().take_written(),
            "STORED\r\nVALUE k 0 5\r\nhello\r\nEND\r\n"
        );
    }

    #[test]
    fn test_transient_write_errors() {
        let mut conn = open();

        conn.socket_mut().feed(b"get k\r\n");
        assert_ok!(conn.do_read());

        for kind in [
            io::ErrorKind::WouldBlock,
            io::ErrorKind::Interrupted,
            io::ErrorKind::BrokenPipe,
        ] {
            conn.socket_mut().writes.push_back(Err(kind.into()));
            assert_ok!(conn.do_write());
            assert_eq!(conn.pending_output(), 1);
            assert!(conn.is_alive());
        }

        assert_ok!(conn.do_write());
        assert_eq!(conn.socket_mut().take_written(), "END\r\n");
    }

    #[test]
    fn test_fatal_write_error() {
        let mut conn = open();
        conn.socket_mut().feed(b"get k\r\n");
        assert_ok!(conn.do_read());

        conn.socket_mut()
            .writes
            .push_back(Err(io::ErrorKind::ConnectionReset.into()));
        assert_err!(conn.do_write());
        assert!(!conn.is_alive());
    }

    #[test]
    fn test_zero_length_write_is_fatal() {
        let mut conn = open();
        conn.socket_mut().feed(b"get k\r\n");
        assert_ok!(conn.do_read());

        conn.socket_mut().writes.push_back(Ok(0));
        match conn.do_write() {
            Err(ConnectionError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::WriteZero),
            other => panic!("expected WriteZero, got {:?}", other),
        }
        assert!(!conn.is_alive());
    }

    #[test]
    fn test_write_with_empty_queue_is_noop() {
        let mut conn = open();
        conn.socket_mut().writes.push_back(Ok(0));
        assert_ok!(conn.do_write());
        assert!(conn.is_alive());
        assert_eq!(conn.socket_mut().writes.len(), 1);
    }

    #[test]
    fn test_eof_with_pending_output() {
        let mut conn = open();

        conn.socket_mut().feed(b"get a\r\nget b\r\n");
        conn.socket_mut().feed(b"");
        assert_ok!(conn.do_read());

        assert_eq!(conn.lifecycle(), Lifecycle::ReadEnded);
        assert!(conn.is_alive());
        assert!(!conn.interest().contains(Interest::READABLE));

        conn.socket_mut().writes.push_back(Ok(5));
        assert_ok!(conn.do_write());
        assert_eq!(conn.lifecycle(), Lifecycle::ReadEnded);
        assert!(!conn.interest().contains(Interest::READABLE));

        assert_ok!(conn.do_write());
        assert_eq!(conn.lifecycle(), Lifecycle::Dead);
        assert_eq!(conn.socket_mut().take_written(), "END\r\nEND\r\n");
    }

    #[test]
    fn test_eof_without_output() {
        let mut conn = open();
        conn.socket_mut().feed(b"");
        assert_ok!(conn.do_read());
        assert!(!conn.is_alive());
    }

    #[test]
    fn test_read_errors() {
        let mut conn = open();
        conn.socket_mut()
            .reads
            .push_back(Err(io::ErrorKind::Interrupted.into()));
        conn.socket_mut().feed(b"get k\r\n");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 1);

        conn.socket_mut()
            .reads
            .push_back(Err(io::ErrorKind::ConnectionReset.into()));
        assert_err!(conn.do_read());
        assert!(!conn.is_alive());
    }

    #[test]
    fn test_large_value_spans_many_reads() {
        let mut conn = open();
        let value = vec![b'v'; 3 * READ_BUFFER_SIZE];

        let mut request = format!("set big {}\r\n", value.len()).into_bytes();
        request.extend_from_slice(&value);
        request.extend_from_slice(b"\r\n");
        conn.socket_mut().feed(&request);

        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());
        assert_eq!(conn.socket_mut().take_written(), "STORED\r\n");
    }

    #[test]
    fn test_error_and_close_callbacks() {
        let mut conn = open();
        conn.on_error();
        assert!(!conn.is_alive());

        let mut conn = open();
        conn.on_close();
        assert!(!conn.is_alive());

        // A dead connection ignores readiness
        conn.socket_mut().feed(b"get k\r\n");
        assert_ok!(conn.do_read());
        assert_eq!(conn.pending_output(), 0);
    }

    #[test]
    fn test_stats() {
        let (mut conn, stats) = connection(ReactorMode::SingleThreaded);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        conn.socket_mut().feed(b"get k\r\n");
        assert_ok!(conn.do_read());
        assert_ok!(conn.do_write());
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 7);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 5);

        drop(conn);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_connection_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Connection<TcpStream>>();
    }
}
