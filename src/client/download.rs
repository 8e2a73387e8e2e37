use std::net::SocketAddr;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bit_set::BitSet;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::client::work::{PieceResult, PieceWork, WorkQueue};
use crate::client::worker::Worker;
use crate::client::{Config, Notification};
use crate::crypto::Sha1;
use crate::error::{Error, Result};
use crate::torrent::Info;

/// What to download: the content identity, the expected piece hashes and the layout.
#[derive(Debug, Clone)]
pub struct Download {
    pub info_hash: Sha1,
    pub pieces: Vec<Sha1>,
    pub piece_size: usize,
    pub total_size: usize,
}

impl Download {
    pub fn total_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Byte range of piece `index` within the content. The last piece is clipped.
    pub fn piece_bounds(&self, index: usize) -> Range<usize> {
        let start = (index * self.piece_size).min(self.total_size);
        let end = (start + self.piece_size).min(self.total_size);
        start..end
    }

    fn work(&self) -> Vec<PieceWork> {
        self.pieces
            .iter()
            .enumerate()
            .map(|(index, hash)| PieceWork::new(index, *hash, self.piece_bounds(index).len()))
            .collect()
    }
}

impl From<&Info> for Download {
    fn from(info: &Info) -> Self {
        Self {
            info_hash: info.info_hash,
            pieces: info.pieces.clone(),
            piece_size: info.piece_size,
            total_size: info.length,
        }
    }
}

/// Drives one download across a set of peers.
///
/// Every peer gets its own worker task. Workers share a queue of outstanding pieces and hand
/// verified pieces to a single aggregator, which assembles the content in place. Peers that fail
/// drop out; the remaining ones pick up their pieces.
///
/// With the default [`Config`] the aggregator has no liveness bound: if no remaining peer can
/// supply some piece, [`Coordinator::run`] never returns. `download_timeout` and
/// `fail_when_peers_exhausted` opt into failing instead.
pub struct Coordinator {
    download: Download,
    peers: Vec<SocketAddr>,
    config: Arc<Config>,
    notifications: Option<mpsc::Sender<Notification>>,
}

impl Coordinator {
    pub fn new(download: Download, peers: Vec<SocketAddr>, config: Config) -> Self {
        Self {
            download,
            peers,
            config: Arc::new(config),
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, notifications: mpsc::Sender<Notification>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub async fn run(self) -> Result<Vec<u8>> {
        let queue = Arc::new(WorkQueue::new(self.download.work()));
        // Stops every worker however this function exits.
        let _close_queue = queue.close_on_drop();
        let active = Arc::new(AtomicUsize::new(0));
        let (results_tx, mut results) = mpsc::channel(1);

        info!(
            "downloading {} pieces from {} peers",
            self.download.total_pieces(),
            self.peers.len()
        );
        for addr in &self.peers {
            let worker = Worker {
                addr: *addr,
                info_hash: self.download.info_hash,
                config: Arc::clone(&self.config),
                queue: Arc::clone(&queue),
                results: results_tx.clone(),
                active: Arc::clone(&active),
            };
            tokio::spawn(worker.run());
        }
        drop(results_tx);

        let content = match self.config.download_timeout {
            Some(limit) => timeout(limit, self.aggregate(&mut results, &active))
                .await
                .map_err(|_| Error::timeout("download", limit))??,
            None => self.aggregate(&mut results, &active).await?,
        };
        queue.close();

        self.notify(Notification::DownloadComplete).await;
        Ok(content)
    }

    async fn aggregate(
        &self,
        results: &mut mpsc::Receiver<PieceResult>,
        active: &AtomicUsize,
    ) -> Result<Vec<u8>> {
        let total = self.download.total_pieces();
        let mut content = vec![0; self.download.total_size];
        let mut done = BitSet::with_capacity(total);

        while done.len() < total {
            let Some(result) = results.recv().await else {
                if self.config.fail_when_peers_exhausted {
                    return Err(Error::PeersExhausted);
                }
                warn!("no peers left, {} pieces missing", total - done.len());
                return std::future::pending().await;
            };
            if !done.insert(result.index) {
                continue;
            }

            let bounds = self.download.piece_bounds(result.index);
            if bounds.len() != result.data.len() {
                return Err(Error::protocol(format!(
                    "piece {} has {} bytes, expected {}",
                    result.index,
                    result.data.len(),
                    bounds.len()
                )));
            }
            content[bounds].copy_from_slice(&result.data);

            let active_peers = active.load(Ordering::SeqCst);
            let notification = Notification::PieceCompleted {
                piece: result.index,
                completed: done.len(),
                total,
                active_peers,
            };
            info!(
                "({:.2}%) downloaded piece #{} from {} peers",
                notification.percent().unwrap_or_default(),
                result.index,
                active_peers
            );
            self.notify(notification).await;
        }

        Ok(content)
    }

    async fn notify(&self, notification: Notification) {
        if let Some(notifications) = &self.notifications {
            let _ = notifications.send(notification).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::peer::testing::{Script, ScriptedPeer, content, piece_hashes, spawn_peer};

    use super::*;

    const INFO_HASH: Sha1 = Sha1([1; 20]);

    fn download(data: &[u8], piece_size: usize) -> Download {
        Download {
            info_hash: INFO_HASH,
            pieces: piece_hashes(data, piece_size),
            piece_size,
            total_size: data.len(),
        }
    }

    fn config() -> Config {
        Config::default()
            .with_idle_backoff(Duration::from_millis(10))
            .with_piece_timeout(Duration::from_secs(5))
    }

    async fn peers(scripts: Vec<Script>) -> Vec<ScriptedPeer> {
        let mut peers = Vec::new();
        for script in scripts {
            peers.push(spawn_peer(script).await);
        }
        peers
    }

    fn addrs(peers: &[ScriptedPeer]) -> Vec<SocketAddr> {
        peers.iter().map(|peer| peer.addr).collect()
    }

    #[test]
    fn piece_bounds_clip_last_piece() {
        let download = Download {
            info_hash: INFO_HASH,
            pieces: vec![Sha1([0; 20]); 3],
            piece_size: 10,
            total_size: 25,
        };

        assert_eq!(download.piece_bounds(0), 0..10);
        assert_eq!(download.piece_bounds(2), 20..25);
        let lengths: Vec<usize> = download.work().iter().map(|work| work.length).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn single_peer_two_pieces() {
        let data = content(32768);
        let peers = peers(vec![Script::new(INFO_HASH, data.clone(), 16384)]).await;

        let result = Coordinator::new(download(&data, 16384), addrs(&peers), config())
            .run()
            .await
            .expect("download failed");

        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn peers_with_disjoint_pieces() {
        let piece_size = 1000;
        let data = content(10 * piece_size);
        let peers = peers(vec![
            Script::new(INFO_HASH, data.clone(), piece_size).with_pieces(0..4),
            Script::new(INFO_HASH, data.clone(), piece_size).with_pieces(4..7),
            Script::new(INFO_HASH, data.clone(), piece_size).with_pieces(7..10),
        ])
        .await;

        let result = Coordinator::new(download(&data, piece_size), addrs(&peers), config())
            .run()
            .await
            .expect("download failed");

        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn uneven_last_piece() {
        let data = content(2500);
        let peers = peers(vec![Script::new(INFO_HASH, data.clone(), 1000)]).await;

        let result = Coordinator::new(download(&data, 1000), addrs(&peers), config())
            .run()
            .await
            .unwrap();

        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn recovers_from_corrupt_delivery() {
        let piece_size = 1000;
        let data = content(4 * piece_size);
        let peers = peers(vec![
            Script::new(INFO_HASH, data.clone(), piece_size).with_corrupt_piece(0),
        ])
        .await;

        let result = Coordinator::new(download(&data, piece_size), addrs(&peers), config())
            .run()
            .await
            .unwrap();

        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn failing_peer_does_not_stop_the_others() {
        let data = content(3000);
        let peers = peers(vec![
            Script::new(INFO_HASH, data.clone(), 1000).with_reply_info_hash(Sha1([2; 20])),
            Script::new(INFO_HASH, data.clone(), 1000).without_bitfield(),
            Script::new(INFO_HASH, data.clone(), 1000),
        ])
        .await;
        let config = Config {
            bitfield_timeout: Duration::from_millis(100),
            ..config()
        };

        let result = Coordinator::new(download(&data, 1000), addrs(&peers), config)
            .run()
            .await
            .unwrap();

        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn stalled_peer_hands_its_piece_back() {
        let piece_size = 1000;
        let data = content(4 * piece_size);
        let peers = peers(vec![
            Script::new(INFO_HASH, data.clone(), piece_size).unresponsive(),
            // Connects late so the stalled peer is first to take a piece.
            Script::new(INFO_HASH, data.clone(), piece_size)
                .with_reply_delay(Duration::from_millis(100)),
        ])
        .await;
        let config = config().with_piece_timeout(Duration::from_millis(200));

        let result = Coordinator::new(download(&data, piece_size), addrs(&peers), config)
            .run()
            .await
            .expect("download failed");

        assert_eq!(result, data);
        assert!(peers[0].requests.load(Ordering::SeqCst) > 0);
        assert_eq!(peers[0].handshakes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn blocks_forever_without_peers() {
        let data = content(100);
        let coordinator = Coordinator::new(download(&data, 50), Vec::new(), config());

        let result = tokio::time::timeout(Duration::from_millis(300), coordinator.run()).await;

        assert!(result.is_err(), "download should never finish");
    }

    #[tokio::test]
    async fn blocks_forever_when_no_peer_has_a_piece() {
        let data = content(2000);
        let peers = peers(vec![Script::new(INFO_HASH, data.clone(), 1000).with_pieces(vec![0])]).await;
        let (tx, mut rx) = mpsc::channel(8);
        let coordinator =
            Coordinator::new(download(&data, 1000), addrs(&peers), config()).with_notifications(tx);

        let result = tokio::time::timeout(Duration::from_millis(500), coordinator.run()).await;

        assert!(result.is_err(), "download should never finish");
        assert!(matches!(
            rx.recv().await,
            Some(Notification::PieceCompleted { piece: 0, .. })
        ));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn fails_when_peers_are_exhausted() {
        let data = content(100);
        let peers = peers(vec![
            Script::new(INFO_HASH, data.clone(), 50).with_reply_info_hash(Sha1([2; 20])),
        ])
        .await;
        let config = config().with_fail_when_peers_exhausted(true);

        let result = Coordinator::new(download(&data, 50), addrs(&peers), config)
            .run()
            .await;

        assert!(matches!(result, Err(Error::PeersExhausted)));
    }

    #[tokio::test]
    async fn download_timeout() {
        let data = content(2000);
        let peers = peers(vec![Script::new(INFO_HASH, data.clone(), 1000).with_pieces(vec![1])]).await;
        let config = config().with_download_timeout(Duration::from_millis(300));

        let result = Coordinator::new(download(&data, 1000), addrs(&peers), config)
            .run()
            .await;

        assert!(matches!(
            result,
            Err(Error::Timeout {
                phase: "download",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn reports_progress() {
        let data = content(3000);
        let peers = peers(vec![Script::new(INFO_HASH, data.clone(), 1000)]).await;
        let (tx, mut rx) = mpsc::channel(8);

        Coordinator::new(download(&data, 1000), addrs(&peers), config())
            .with_notifications(tx)
            .run()
            .await
            .unwrap();

        let mut completed = Vec::new();
        while let Some(notification) = rx.recv().await {
            completed.push(notification);
        }
        assert_eq!(completed.len(), 4);
        assert!(matches!(
            completed[2],
            Notification::PieceCompleted {
                completed: 3,
                total: 3,
                active_peers: 1,
                ..
            }
        ));
        assert_eq!(completed[3], Notification::DownloadComplete);
    }

    #[tokio::test]
    async fn announces_completed_pieces_to_the_peer() {
        let data = content(2000);
        let peers = peers(vec![Script::new(INFO_HASH, data.clone(), 1000)]).await;

        Coordinator::new(download(&data, 1000), addrs(&peers), config())
            .run()
            .await
            .unwrap();

        let mut haves = Vec::new();
        for _ in 0..50 {
            haves = peers[0].haves.lock().await.clone();
            if haves.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        haves.sort();
        assert_eq!(haves, vec![0, 1]);
    }
}
