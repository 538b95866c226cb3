//! Peer transport
//!
//! How a replicated write or a health probe reaches another node. The coordinator
//! only sees the trait, so tests substitute in-process fakes.

use std::io::ErrorKind;
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::network::Client;
use crate::protocol::{Command, Request, Status};

use super::coordinator::WriteOp;

/// Delivery of writes and probes to a peer
pub trait PeerTransport: Send + Sync {
    /// Send `op` with the replication marker set, bounded by `timeout`.
    ///
    /// `Ok` when the peer applied it; `KeyNotFound` when the peer reported the key
    /// missing; `PeerUnreachable`, `PeerTimeout` or `PeerRejected` otherwise.
    fn replicate(&self, peer: &str, op: &WriteOp, timeout: Duration) -> Result<()>;

    /// Liveness check bounded by `timeout`
    fn ping(&self, peer: &str, timeout: Duration) -> Result<()>;
}

/// [`PeerTransport`] over the node's own TCP protocol. One connection per attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    fn call(&self, peer: &str, request: &Request, timeout: Duration) -> Result<()> {
        let mut client =
            Client::connect_timeout(peer, timeout).map_err(|e| classify(peer, e))?;
        let response = client.send(request).map_err(|e| classify(peer, e))?;

        match response.status {
            Status::Ok => Ok(()),
            Status::NotFound => Err(KvError::KeyNotFound),
            _ => Err(KvError::PeerRejected {
                peer: peer.to_string(),
                message: response.message(),
            }),
        }
    }
}

impl PeerTransport for TcpTransport {
    fn replicate(&self, peer: &str, op: &WriteOp, timeout: Duration) -> Result<()> {
        self.call(peer, &Request::replicated(op.to_command()), timeout)
    }

    fn ping(&self, peer: &str, timeout: Duration) -> Result<()> {
        self.call(peer, &Request::new(Command::Ping), timeout)
    }
}

/// Map connection-level failures onto the peer error kinds
fn classify(peer: &str, error: KvError) -> KvError {
    match error {
        KvError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            KvError::PeerTimeout(peer.to_string())
        }
        KvError::Io(e) => KvError::PeerUnreachable(format!("{} ({})", peer, e)),
        KvError::Network(msg) => KvError::PeerUnreachable(format!("{} ({})", peer, msg)),
        other => other,
    }
}
