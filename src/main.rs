//! shardcache - An In-Memory, memcached-style LRU Cache Server
//!
//! This is the main entry point for the server.
//! It parses flags, sets up logging, builds the runtime for the chosen
//! reactor mode and serves connections until Ctrl+C.

use anyhow::Context;
use shardcache::config::{Invocation, ServerConfig};
use shardcache::connection::ReactorMode;
use shardcache::server::Server;
use shardcache::storage::{Storage, StripedLru};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
shardcache - An in-memory, memcached-style LRU cache server

USAGE:
    shardcache [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 11211)
    -m, --mode <st|mt>         Single- or multi-threaded reactor (default: mt)
    -w, --workers <N>          Worker threads in mt mode (default: CPU count)
    -s, --shards <N>           Number of cache shards (default: 4)
    -c, --capacity <SIZE>      Total cache size, K/M/G suffixes allowed (default: 64M)
    -l, --log-level <FILTER>   Log filter when RUST_LOG is unset (default: info)
    -v, --version              Print version information
        --help                 Print this help message

EXAMPLES:
    shardcache                         # Start on 127.0.0.1:11211
    shardcache -m st -c 256M           # One thread, 256 MiB cache
    shardcache --host 0.0.0.0 -s 16    # All interfaces, 16 shards

CONNECTING:
    Any memcached text-protocol client works:
    $ printf 'set name 4\r\ndata\r\nget name\r\n' | nc 127.0.0.1 11211
    STORED
    VALUE name 0 4
    data
    END
"#
    );
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
shardcache v{} - In-Memory LRU Cache Server
──────────────────────────────────────────────
Server started on {}
Mode: {:?}, shards: {}, capacity: {} bytes
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        shardcache::VERSION,
        config.bind_address(),
        config.mode,
        config.shards,
        config.capacity,
    );
}

fn init_logging(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(config.mode == ReactorMode::MultiThreaded)
        .with_file(false)
        .with_line_number(false)
        .init();
    Ok(())
}

fn build_runtime(config: &ServerConfig) -> std::io::Result<Runtime> {
    match config.mode {
        ReactorMode::SingleThreaded => Builder::new_current_thread().enable_all().build(),
        ReactorMode::MultiThreaded => Builder::new_multi_thread()
            .worker_threads(config.workers)
            .enable_all()
            .build(),
    }
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match ServerConfig::from_args().context("invalid command line")? {
        Invocation::Run(config) => config,
        Invocation::Help => {
            print_help();
            return Ok(());
        }
        Invocation::Version => {
            println!("shardcache version {}", shardcache::VERSION);
            return Ok(());
        }
    };

    init_logging(&config)?;

    let runtime = build_runtime(&config).context("failed to start the tokio runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    // Create the cache (shared across all connections)
    let storage: Arc<dyn Storage> = Arc::new(
        StripedLru::new(config.shards, config.capacity).context("failed to create the cache")?,
    );
    info!(
        shards = config.shards,
        capacity = config.capacity,
        "Cache initialized"
    );

    let server = Server::bind(config.bind_address(), storage, config.mode)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    print_banner(&config);

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    };

    // Main accept loop
    tokio::select! {
        _ = server.run() => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}
