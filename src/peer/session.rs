use log::debug;
use tokio::time::timeout;

use crate::client::Config;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::peer::Connection;

/// Downloads piece `piece` of `length` bytes over `connection`.
///
/// Up to `config.max_backlog` block requests are kept in flight while the peer has us unchoked.
/// The whole transfer, reads and writes alike, must finish within `config.piece_timeout`. The
/// returned buffer is not hash-checked.
pub async fn download_piece(
    connection: &mut Connection,
    piece: usize,
    length: usize,
    config: &Config,
) -> Result<Vec<u8>> {
    let session = PieceDownload {
        connection,
        piece,
        length,
        max_backlog: config.max_backlog,
        block_size: config.block_size_bytes(),
        requested: 0,
        downloaded: 0,
        backlog: 0,
        buf: vec![0; length],
    };
    timeout(config.piece_timeout, session.run())
        .await
        .map_err(|_| Error::timeout("piece download", config.piece_timeout))?
}

struct PieceDownload<'a> {
    connection: &'a mut Connection,
    piece: usize,
    length: usize,
    max_backlog: usize,
    block_size: usize,
    requested: usize,
    downloaded: usize,
    backlog: usize,
    buf: Vec<u8>,
}

impl PieceDownload<'_> {
    async fn run(mut self) -> Result<Vec<u8>> {
        while self.downloaded < self.length {
            if !self.connection.is_choked() {
                self.fill_backlog().await?;
            }
            let message = self.connection.read().await?;
            self.handle(message)?;
        }
        debug!(
            "[{}] piece {} downloaded ({} bytes)",
            self.connection.addr(),
            self.piece,
            self.length
        );
        Ok(self.buf)
    }

    async fn fill_backlog(&mut self) -> Result<()> {
        while self.backlog < self.max_backlog && self.requested < self.length {
            let block_size = self.block_size.min(self.length - self.requested);
            self.connection
                .send_request(self.piece, self.requested, block_size)
                .await?;
            self.backlog += 1;
            self.requested += block_size;
        }
        Ok(())
    }

    fn handle(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Unchoke => self.connection.set_choked(false),
            // Requests already sent stay outstanding.
            Message::Choke => self.connection.set_choked(true),
            Message::Have(piece) => self.connection.mark_piece(piece),
            message @ Message::Piece(_) => {
                let copied = message.parse_piece(self.piece, &mut self.buf)?;
                self.downloaded = (self.downloaded + copied).min(self.length);
                self.backlog = self.backlog.saturating_sub(1);
            }
            _ => (),
        }
        Ok(())
    }
}
