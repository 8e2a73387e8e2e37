use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::client::Config;
use crate::client::work::{PieceResult, WorkQueue};
use crate::crypto::Sha1;
use crate::error::Result;
use crate::peer::{Connection, download_piece};

/// Downloads pieces from a single remote peer until the queue closes or the peer fails for good.
pub(super) struct Worker {
    pub addr: SocketAddr,
    pub info_hash: Sha1,
    pub config: Arc<Config>,
    pub queue: Arc<WorkQueue>,
    pub results: mpsc::Sender<PieceResult>,
    pub active: Arc<AtomicUsize>,
}

impl Worker {
    pub async fn run(self) {
        let mut reconnects = 0;
        loop {
            match self.connect_and_serve().await {
                Ok(()) => return,
                Err(err) => warn!("[{}] {}", self.addr, err),
            }
            if self.queue.is_closed() || reconnects >= self.config.max_reconnects {
                info!("[{}] dropping peer", self.addr);
                return;
            }
            reconnects += 1;
            debug!(
                "[{}] reconnecting ({}/{})",
                self.addr, reconnects, self.config.max_reconnects
            );
            if !self.pause(self.config.reconnect_delay).await {
                return;
            }
        }
    }

    async fn connect_and_serve(&self) -> Result<()> {
        let mut connection = Connection::connect(self.addr, self.info_hash, &self.config).await?;
        info!("[{}] connected", self.addr);
        let _active = ActiveGuard::new(&self.active);
        connection.send_unchoke().await?;
        connection.send_interested().await?;
        self.serve(&mut connection).await
    }

    async fn serve(&self, connection: &mut Connection) -> Result<()> {
        let mut misses = 0;
        while let Some(piece) = self.queue.pop().await {
            if !connection.has_piece(piece.index) {
                self.queue.push(piece);
                misses += 1;
                if misses >= self.queue.capacity() {
                    misses = 0;
                    if !self.pause(self.config.idle_backoff).await {
                        break;
                    }
                } else {
                    tokio::task::yield_now().await;
                }
                continue;
            }
            misses = 0;

            let downloaded = tokio::select! {
                _ = self.queue.closed() => break,
                result = download_piece(connection, piece.index, piece.length, &self.config) => result,
            };
            let data = match downloaded {
                Ok(data) => data,
                Err(err) => {
                    self.queue.push(piece);
                    return Err(err);
                }
            };

            if let Err(err) = piece.verify(&data) {
                warn!("[{}] {}", self.addr, err);
                self.queue.push(piece);
                continue;
            }

            if let Err(err) = connection.send_have(piece.index).await {
                debug!("[{}] unable to announce piece {}: {}", self.addr, piece.index, err);
            }
            let result = PieceResult {
                index: piece.index,
                data,
            };
            if self.results.send(result).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Sleeps for `duration`. Returns false if the queue was closed in the meantime.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.queue.closed() => false,
            _ = sleep(duration) => true,
        }
    }
}

/// Counts a worker as active while it holds an established connection.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn new(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
