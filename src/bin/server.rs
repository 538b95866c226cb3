//! QuorumKV Server Binary
//!
//! Starts one cluster node: opens the disk store and serves the TCP protocol.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quorumkv::network::Server;
use quorumkv::store::DiskStore;
use quorumkv::{Config, Node};
use tracing_subscriber::{fmt, EnvFilter};

/// QuorumKV Server
#[derive(Parser, Debug)]
#[command(name = "quorumkv-server")]
#[command(about = "Durable key-value store with majority-quorum replication")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./quorumkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Peer addresses (host:port), comma separated, excluding this node
    #[arg(short, long, env = "QUORUMKV_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// MemTable size limit in MB before flush
    #[arg(long, default_value = "64")]
    memtable_mb: usize,

    /// Hot cache capacity in entries (0 disables the cache)
    #[arg(long, default_value = "10000")]
    cache_capacity: usize,

    /// Attempts per peer per write
    #[arg(long, default_value = "3")]
    retry_attempts: u32,

    /// Per-attempt timeout for single-key writes to a peer, in milliseconds
    #[arg(long, default_value = "5000")]
    peer_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,quorumkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("QuorumKV Server v{}", quorumkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Peers: {:?}", args.peers);

    let peers: Vec<String> = args
        .peers
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .peers(peers)
        .max_connections(args.max_connections)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .cache_capacity(args.cache_capacity)
        .retry_attempts(args.retry_attempts)
        .peer_timeout(Duration::from_millis(args.peer_timeout_ms))
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let store = match DiskStore::open(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let node = match Node::builder(config.clone()).store(store).build() {
        Ok(node) => Arc::new(node),
        Err(e) => {
            tracing::error!("Failed to start node: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, node) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
