//! TCP Server
//!
//! Accepts client sockets and spawns one driver task per connection.

use crate::connection::{handle_connection, ConnectionStats, ReactorMode};
use crate::storage::Storage;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info, warn};

/// A bound listener plus everything its connections share.
pub struct Server {
    listener: TcpListener,
    storage: Arc<dyn Storage>,
    stats: Arc<ConnectionStats>,
    mode: ReactorMode,
}

impl Server {
    /// Binds the listening socket.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        storage: Arc<dyn Storage>,
        mode: ReactorMode,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, ?mode, "Listening");

        Ok(Self {
            listener,
            storage,
            stats: Arc::new(ConnectionStats::new()),
            mode,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Main loop that accepts incoming connections.
    ///
    /// Runs until the returned future is dropped; accept failures are logged
    /// and do not stop the loop.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        Arc::clone(&self.storage),
                        Arc::clone(&self.stats),
                        self.mode,
                    ));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StripedLru;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn create_test_server(mode: ReactorMode) -> (SocketAddr, Arc<ConnectionStats>) {
        let storage: Arc<dyn Storage> = Arc::new(StripedLru::new(4, 4 * 1024 * 1024).unwrap());
        let server = Server::bind("127.0.0.1:0", storage, mode).await.unwrap();
        let addr = server.local_addr().unwrap();
        let stats = server.stats();

        tokio::spawn(server.run());

        (addr, stats)
    }

    /// Reads until `expected` bytes have arrived.
    async fn read_exact_string(client: &mut TcpStream, expected: usize) -> String {
        let mut buf = vec![0u8; expected];
        client.read_exact(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _) = create_test_server(ReactorMode::SingleThreaded).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"set name 4\r\ndata\r\n").await.unwrap();
        assert_eq!(read_exact_string(&mut client, 8).await, "STORED\r\n");

        client.write_all(b"get name\r\n").await.unwrap();
        let expected = "VALUE name 0 4\r\ndata\r\nEND\r\n";
        assert_eq!(read_exact_string(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_get_split_across_packets() {
        let (addr, _) = create_test_server(ReactorMode::SingleThreaded).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.set_nodelay(true).unwrap();

        client.write_all(b"GET mis").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.write_all(b"sing-key\r\n").await.unwrap();

        assert_eq!(read_exact_string(&mut client, 5).await, "END\r\n");
    }

    #[tokio::test]
    async fn test_pipeline_past_backpressure() {
        let (addr, _) = create_test_server(ReactorMode::SingleThreaded).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut request = Vec::new();
        for i in 0..250 {
            request.extend_from_slice(format!("set key{} 1\r\n{}\r\n", i, i % 10).as_bytes());
        }
        for i in 0..250 {
            request.extend_from_slice(format!("get key{}\r\n", i).as_bytes());
        }
        client.write_all(&request).await.unwrap();

        let mut expected = "STORED\r\n".repeat(250);
        for i in 0..250 {
            expected.push_str(&format!("VALUE key{} 0 1\r\n{}\r\nEND\r\n", i, i % 10));
        }
        assert_eq!(read_exact_string(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_half_close_flushes_responses() {
        let (addr, _) = create_test_server(ReactorMode::SingleThreaded).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"set a 1\r\n1\r\nget a\r\ndelete a\r\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert_eq!(response, "STORED\r\nVALUE a 0 1\r\n1\r\nEND\r\nDELETED\r\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, stats) = create_test_server(ReactorMode::SingleThreaded).await;

        {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(b"get k\r\n").await.unwrap();
            assert_eq!(read_exact_string(&mut client, 5).await, "END\r\n");
            assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        }

        for _ in 0..100 {
            if stats.active_connections.load(Ordering::Relaxed) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_clients() {
        let (addr, _) = create_test_server(ReactorMode::MultiThreaded).await;

        let mut handles = vec![];
        for c in 0..8 {
            handles.push(tokio::spawn(async move {
                let mut client = TcpStream::connect(addr).await.unwrap();
                for i in 0..50 {
                    let key = format!("c{}-k{}", c, i);
                    let value = format!("v{}", i);
                    client
                        .write_all(
                            format!("set {} {}\r\n{}\r\n", key, value.len(), value).as_bytes(),
                        )
                        .await
                        .unwrap();
                    assert_eq!(read_exact_string(&mut client, 8).await, "STORED\r\n");

                    client
                        .write_all(format!("get {}\r\n", key).as_bytes())
                        .await
                        .unwrap();
                    let expected = format!("VALUE {} 0 {}\r\n{}\r\nEND\r\n", key, value.len(), value);
                    assert_eq!(
                        read_exact_string(&mut client, expected.len()).await,
                        expected
                    );
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
