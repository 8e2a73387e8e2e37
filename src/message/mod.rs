mod block;
mod codec;
mod handshake;

pub use block::*;
pub use codec::*;
pub use handshake::*;

use crate::error::{Error, Result};
use crate::peer::Bitfield;

/// All of the remaining messages in the protocol take the form of <length prefix><message
/// ID><payload>. The length prefix is a four byte big-endian value. The message ID is a single
/// decimal byte. The payload is message dependent.
#[derive(PartialEq, Clone)]
pub enum Message {
    /// # keep-alive: <len=0000>
    ///
    /// The **keep-alive** message is a message with zero bytes, specified with the length prefix
    /// set to zero. There is no message ID and no payload. It carries no message at all: callers
    /// treat it as a no-op rather than as one of the identified messages below.
    KeepAlive,

    /// # choke: <len=0001><id=0>
    Choke,

    /// # unchoke: <len=0001><id=1>
    Unchoke,

    /// # interested: <len=0001><id=2>
    Interested,

    /// # not interested: <len=0001><id=3>
    NotInterested,

    /// # have: <len=0005><id=4><piece index>
    ///
    /// The payload is the zero-based index of a piece that has just been successfully downloaded
    /// and verified via the hash.
    Have(usize),

    /// # bitfield: <len=0001+X><id=5><bitfield>
    ///
    /// The payload is a bitfield representing the pieces that have been successfully downloaded.
    /// The high bit in the first byte corresponds to piece index 0.
    Bitfield(Bitfield),

    /// # request: <len=0013><id=6><index><begin><length>
    Request(Block),

    /// # piece: <len=0009+X><id=7><index><begin><block>
    Piece(BlockData),

    /// # cancel: <len=0013><id=8><index><begin><length>
    Cancel(Block),

    /// # port: <len=0003><id=9><listen-port>
    ///
    /// Sent by DHT capable peers. Decoded so it can be skipped, never acted upon.
    Port(u16),

    /// Any other message id (extension protocol and friends). Passed through untouched.
    Unknown { id: u8, payload: Vec<u8> },
}

impl Message {
    pub fn have(piece: usize) -> Self {
        Self::Have(piece)
    }

    pub fn request(piece: usize, offset: usize, length: usize) -> Self {
        Self::Request(Block::new(piece, offset, length))
    }

    /// Returns the piece index announced by a **have** message.
    pub fn parse_have(&self) -> Result<usize> {
        match self {
            Self::Have(piece) => Ok(*piece),
            other => Err(Error::Protocol(format!("expected have, got {:?}", other))),
        }
    }

    /// Copies the data of a **piece** message for `expected_piece` into `buf`, returning the
    /// number of bytes copied.
    pub fn parse_piece(&self, expected_piece: usize, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Piece(block) => block.copy_into(expected_piece, buf),
            other => Err(Error::Protocol(format!("expected piece, got {:?}", other))),
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::KeepAlive => write!(f, "KeepAlive"),
            Message::Choke => write!(f, "Choke"),
            Message::Unchoke => write!(f, "Unchoke"),
            Message::Interested => write!(f, "Interested"),
            Message::NotInterested => write!(f, "NotInterested"),
            Message::Have(piece) => write!(f, "Have {{ piece: {} }}", piece),
            Message::Bitfield(bitfield) => write!(f, "{:?}", bitfield),
            Message::Request(block) => write!(f, "Request({:?})", block),
            Message::Piece(block) => {
                write!(
                    f,
                    "Piece {{ piece: {}, offset: {}, data: <{} bytes> }}",
                    block.piece,
                    block.offset,
                    block.data.len()
                )
            }
            Message::Cancel(block) => write!(f, "Cancel({:?})", block),
            Message::Port(port) => write!(f, "Port({})", port),
            Message::Unknown { id, payload } => {
                write!(f, "Unknown {{ id: {}, payload: <{} bytes> }}", id, payload.len())
            }
        }
    }
}
