use std::time::Duration;

use thiserror::Error;

use crate::crypto::Sha1;

/// Errors raised by the peer wire protocol engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer violated the wire protocol: malformed frame, unexpected message, info hash
    /// mismatch and so on.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket connect, read or write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A phase deadline elapsed.
    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: &'static str, after: Duration },

    /// A downloaded piece does not hash to the expected value.
    #[error("piece {piece} failed integrity check: expected {expected}, got {actual}")]
    Integrity {
        piece: usize,
        expected: Sha1,
        actual: Sha1,
    },

    /// The requested operation is not supported (e.g. a non-HTTP tracker).
    #[error("unsupported: {0}")]
    Capability(String),

    /// Every peer worker has exited while pieces were still missing.
    #[error("no peers left to download from")]
    PeersExhausted,
}

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn timeout(phase: &'static str, after: Duration) -> Self {
        Self::Timeout { phase, after }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
