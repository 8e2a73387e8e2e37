use std::time::Duration;

use size::Size;

use crate::core::PeerId;

/// Configuration settings for a download
#[derive(Clone, Debug)]
pub struct Config {
    // Identity and Network Settings
    /// Unique identifier for this peer in the swarm
    pub client_id: PeerId,
    /// Port number advertised to the tracker
    pub port: u16,

    // Transfer Settings
    /// Largest block requested in a single request message
    pub block_size: Size,
    /// Maximum number of unanswered block requests per connection
    pub max_backlog: usize,
    /// Largest frame (message id plus payload) accepted from a peer
    pub max_message_length: Size,

    // Deadlines
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Timeout for the handshake exchange
    pub handshake_timeout: Duration,
    /// Timeout for the peer's initial bitfield
    pub bitfield_timeout: Duration,
    /// Timeout covering the whole transfer of one piece
    pub piece_timeout: Duration,

    // Worker Settings
    /// Pause after a worker went through a whole queue without finding a piece its peer has
    pub idle_backoff: Duration,
    /// Times a worker redials its peer after a failed connection or piece transfer
    pub max_reconnects: usize,
    /// Pause before each redial
    pub reconnect_delay: Duration,

    // Liveness Settings
    /// Overall deadline for the download; unlimited if unset
    pub download_timeout: Option<Duration>,
    /// Give up once every peer worker has exited instead of waiting forever
    pub fail_when_peers_exhausted: bool,
}

impl Config {
    pub fn with_client_id(mut self, client_id: PeerId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_block_size(mut self, size: Size) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_max_backlog(mut self, n: usize) -> Self {
        self.max_backlog = n;
        self
    }

    pub fn with_piece_timeout(mut self, timeout: Duration) -> Self {
        self.piece_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_max_reconnects(mut self, n: usize) -> Self {
        self.max_reconnects = n;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn with_fail_when_peers_exhausted(mut self, fail: bool) -> Self {
        self.fail_when_peers_exhausted = fail;
        self
    }
}

impl Config {
    pub(crate) fn block_size_bytes(&self) -> usize {
        self.block_size.bytes() as usize
    }

    pub(crate) fn max_message_length_bytes(&self) -> usize {
        self.max_message_length.bytes() as usize
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: PeerId::random(),
            port: 6881,
            block_size: Size::from_kibibytes(16),
            max_backlog: 5,
            max_message_length: Size::from_mebibytes(1),
            connect_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(3),
            bitfield_timeout: Duration::from_secs(3),
            piece_timeout: Duration::from_secs(30),
            idle_backoff: Duration::from_millis(100),
            max_reconnects: 0,
            reconnect_delay: Duration::from_secs(1),
            download_timeout: None,
            fail_when_peers_exhausted: false,
        }
    }
}
