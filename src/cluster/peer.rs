//! Peer state types

use serde::{Deserialize, Serialize};

/// What this node currently believes about a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerHealth {
    /// No fresh record. Treated as healthy until proven otherwise.
    Unknown,
    Healthy { checked_at: u64 },
    Unhealthy { checked_at: u64 },
}

impl PeerHealth {
    /// Optimistic reading: only a fresh failure counts against a peer
    pub fn is_healthy(&self) -> bool {
        !matches!(self, PeerHealth::Unhealthy { .. })
    }
}

/// Progress of one write towards one peer
///
/// ```text
/// NotAttempted -> Attempting(1) -> Acked
///                      |
///                      v
///                 Attempting(n+1) -> ... -> ExhaustedRetries
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAttempt {
    NotAttempted,
    Attempting(u32),
    Acked { attempts: u32 },
    ExhaustedRetries { attempts: u32, last_error: String },
}

impl PeerAttempt {
    /// Move to the next attempt
    pub fn next(self) -> Self {
        match self {
            PeerAttempt::NotAttempted => PeerAttempt::Attempting(1),
            PeerAttempt::Attempting(n) => PeerAttempt::Attempting(n + 1),
            done => done,
        }
    }

    /// The current attempt succeeded
    pub fn ack(self) -> Self {
        match self {
            PeerAttempt::Attempting(n) => PeerAttempt::Acked { attempts: n },
            other => other,
        }
    }

    /// The current attempt failed and no attempts remain
    pub fn exhaust(self, last_error: String) -> Self {
        match self {
            PeerAttempt::Attempting(n) => PeerAttempt::ExhaustedRetries {
                attempts: n,
                last_error,
            },
            PeerAttempt::NotAttempted => PeerAttempt::ExhaustedRetries {
                attempts: 0,
                last_error,
            },
            other => other,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PeerAttempt::NotAttempted => 0,
            PeerAttempt::Attempting(n) => *n,
            PeerAttempt::Acked { attempts } | PeerAttempt::ExhaustedRetries { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_acked(&self) -> bool {
        matches!(self, PeerAttempt::Acked { .. })
    }
}
