//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.
//!
//! Workers are spawned on demand: a connection is handed over a crossbeam channel
//! and a new worker is started only when none is idle, up to `max_connections`.
//! Each worker serves one connection at a time with blocking I/O.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver};

use crate::config::Config;
use crate::error::Result;
use crate::network::Connection;
use crate::node::Node;

/// TCP server for a QuorumKV node
pub struct Server {
    config: Config,
    node: Arc<Node>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

/// Stops a running [`Server`] from another thread
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to stop accepting connections
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Wake the acceptor blocked in accept()
        let _ = TcpStream::connect(self.addr);
    }
}

/// Bookkeeping shared by the acceptor and the workers
struct Pool {
    idle: AtomicUsize,
    spawned: AtomicUsize,
}

impl Server {
    /// Bind to `config.listen_addr`. Port 0 picks a free port; see [`Server::local_addr`].
    pub fn bind(config: Config, node: Arc<Node>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            node,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: self.shutdown.clone(),
            addr: self.local_addr,
        }
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown_handle().shutdown();
    }

    /// Accept connections until shut down (blocking)
    ///
    /// Connections already handed to workers are served to completion.
    pub fn run(&self) -> Result<()> {
        let max_workers = self.config.max_connections.max(1);
        let (tx, rx) = channel::bounded::<TcpStream>(max_workers);
        let pool = Arc::new(Pool {
            idle: AtomicUsize::new(0),
            spawned: AtomicUsize::new(0),
        });

        tracing::info!("Listening on {}", self.local_addr);

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            // Claim an idle worker, or start one if the pool has room
            let claimed = pool
                .idle
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !claimed && pool.spawned.load(Ordering::SeqCst) < max_workers {
                self.spawn_worker(rx.clone(), pool.clone())?;
            }

            if tx.send(stream).is_err() {
                break;
            }
        }

        tracing::info!("Server on {} shutting down", self.local_addr);
        Ok(())
    }

    fn spawn_worker(&self, rx: Receiver<TcpStream>, pool: Arc<Pool>) -> Result<()> {
        let id = pool.spawned.fetch_add(1, Ordering::SeqCst);

        let node = self.node.clone();
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        thread::Builder::new()
            .name(format!("quorumkv-worker-{}", id))
            .spawn(move || {
                for stream in rx.iter() {
                    if let Err(e) = serve(stream, node.clone(), read_ms, write_ms) {
                        tracing::debug!("Connection ended with error: {}", e);
                    }
                    pool.idle.fetch_add(1, Ordering::SeqCst);
                }
            })?;

        Ok(())
    }
}

fn serve(stream: TcpStream, node: Arc<Node>, read_ms: u64, write_ms: u64) -> Result<()> {
    let mut connection = Connection::new(stream, node)?;
    connection.set_timeouts(read_ms, write_ms)?;
    connection.handle()
}
