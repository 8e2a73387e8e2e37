use log::warn;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::crypto::Sha1;
use crate::error::{Error, Result};

/// One piece to fetch: its index, expected hash and exact length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceWork {
    pub index: usize,
    pub hash: Sha1,
    pub length: usize,
}

impl PieceWork {
    pub fn new(index: usize, hash: Sha1, length: usize) -> Self {
        Self {
            index,
            hash,
            length,
        }
    }

    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let actual = Sha1::digest(data);
        if actual != self.hash {
            return Err(Error::Integrity {
                piece: self.index,
                expected: self.hash,
                actual,
            });
        }
        Ok(())
    }
}

/// A verified piece on its way to the aggregator.
#[derive(Debug)]
pub struct PieceResult {
    pub index: usize,
    pub data: Vec<u8>,
}

/// Multi-producer, multi-consumer queue of outstanding pieces.
///
/// The channel is sized to the number of pieces. At most one copy of each piece is either queued
/// or held by a worker, so pushing back never waits.
pub struct WorkQueue {
    tx: mpsc::Sender<PieceWork>,
    rx: Mutex<mpsc::Receiver<PieceWork>>,
    capacity: usize,
    closed: CancellationToken,
}

impl WorkQueue {
    pub fn new(work: Vec<PieceWork>) -> Self {
        let capacity = work.len().max(1);
        let (tx, rx) = mpsc::channel(capacity);
        for piece in work {
            // Capacity covers every piece.
            let _ = tx.try_send(piece);
        }
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
            closed: CancellationToken::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a piece to the queue.
    ///
    /// Panics in debug builds if the queue is already full, which means some piece was pushed
    /// twice.
    pub fn push(&self, piece: PieceWork) {
        let pushed = self.tx.try_send(piece);
        debug_assert!(pushed.is_ok(), "work queue pushed beyond its capacity");
        if let Err(err) = pushed {
            warn!("unable to requeue piece: {}", err);
        }
    }

    /// Takes the next piece, or `None` once the queue is closed.
    pub async fn pop(&self) -> Option<PieceWork> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            piece = async { self.rx.lock().await.recv().await } => piece,
        }
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the queue is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Closes the queue when the returned guard is dropped.
    pub fn close_on_drop(&self) -> DropGuard {
        self.closed.clone().drop_guard()
    }
}
