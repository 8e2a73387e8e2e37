use std::io::ErrorKind;
use std::net::SocketAddr;

use futures::SinkExt;
use log::debug;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

use crate::client::Config;
use crate::codec::{AsyncDecoder, AsyncEncoder};
use crate::crypto::Sha1;
use crate::error::{Error, Result};
use crate::message::{Handshake, Message, MessageCodec};
use crate::peer::Bitfield;

type Messages = Framed<TcpStream, MessageCodec>;

/// An established connection to a remote peer: the handshake is done and its bitfield is known.
///
/// The connection is owned by a single worker. Its choke flag and bitfield change only in
/// response to messages read by that worker while downloading a piece.
pub struct Connection {
    addr: SocketAddr,
    messages: Messages,
    bitfield: Bitfield,
    choked: bool,
}

impl Connection {
    /// Dials `addr`, exchanges handshakes and waits for the peer's bitfield, each phase under its
    /// own deadline. The socket is closed if any phase fails.
    pub async fn connect(addr: SocketAddr, info_hash: Sha1, config: &Config) -> Result<Self> {
        debug!("[{}] connecting...", addr);
        let mut socket = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::timeout("connect", config.connect_timeout))??;

        let handshake = Handshake::new(info_hash, config.client_id);
        timeout(
            config.handshake_timeout,
            exchange_handshakes(&mut socket, &handshake),
        )
        .await
        .map_err(|_| Error::timeout("handshake", config.handshake_timeout))??;
        debug!("[{}] handshake complete", addr);

        let mut messages = Framed::new(
            socket,
            MessageCodec::new(config.max_message_length_bytes()),
        );
        let bitfield = timeout(config.bitfield_timeout, receive_bitfield(&mut messages))
            .await
            .map_err(|_| Error::timeout("bitfield", config.bitfield_timeout))??;
        debug!("[{}] < got {:?}", addr, bitfield);

        Ok(Self {
            addr,
            messages,
            bitfield,
            choked: true,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn has_piece(&self, piece: usize) -> bool {
        self.bitfield.has_piece(piece)
    }

    pub fn is_choked(&self) -> bool {
        self.choked
    }

    pub(super) fn set_choked(&mut self, choked: bool) {
        self.choked = choked;
    }

    pub(super) fn mark_piece(&mut self, piece: usize) {
        self.bitfield.set_piece(piece);
    }

    pub async fn send_interested(&mut self) -> Result<()> {
        self.send(Message::Interested).await
    }

    pub async fn send_unchoke(&mut self) -> Result<()> {
        self.send(Message::Unchoke).await
    }

    pub async fn send_have(&mut self, piece: usize) -> Result<()> {
        self.send(Message::have(piece)).await
    }

    pub async fn send_request(&mut self, piece: usize, offset: usize, length: usize) -> Result<()> {
        self.send(Message::request(piece, offset, length)).await
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        debug!("[{}] > sending {:?}", self.addr, &message);
        self.messages.send(message).await
    }

    /// Waits for the next frame. A keep-alive comes back as [`Message::KeepAlive`]. There is no
    /// deadline here; callers bound the read themselves.
    pub async fn read(&mut self) -> Result<Message> {
        let message = next_message(&mut self.messages).await?;
        debug!("[{}] < got {:?}", self.addr, message);
        Ok(message)
    }
}

async fn exchange_handshakes(socket: &mut TcpStream, handshake: &Handshake) -> Result<()> {
    // We always initiate: send ours, then wait for theirs.
    handshake.encode(socket).await?;
    let handshake_got = Handshake::decode(socket).await?;
    if handshake.info_hash != handshake_got.info_hash {
        return Err(Error::Protocol(format!(
            "expected info hash {}, got {}",
            handshake.info_hash, handshake_got.info_hash
        )));
    }
    Ok(())
}

async fn receive_bitfield(messages: &mut Messages) -> Result<Bitfield> {
    match next_message(messages).await? {
        Message::Bitfield(bitfield) => Ok(bitfield),
        other => Err(Error::Protocol(format!(
            "expected bitfield, got {:?}",
            other
        ))),
    }
}

async fn next_message(messages: &mut Messages) -> Result<Message> {
    match messages.next().await {
        Some(result) => result,
        None => Err(Error::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "peer closed the connection",
        ))),
    }
}
