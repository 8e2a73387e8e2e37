use tokio_util::bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::TransportMessage;
use crate::error::{Error, Result};
use crate::message::{Block, BlockData, Message};
use crate::peer::Bitfield;

const ID_CHOKE: u8 = 0;
const ID_UNCHOKE: u8 = 1;
const ID_INTERESTED: u8 = 2;
const ID_NOT_INTERESTED: u8 = 3;
const ID_HAVE: u8 = 4;
const ID_BITFIELD: u8 = 5;
const ID_REQUEST: u8 = 6;
const ID_PIECE: u8 = 7;
const ID_CANCEL: u8 = 8;
const ID_PORT: u8 = 9;
const LENGTH_SIZE: usize = 4;

/// Frames messages as `<4-byte big-endian length><id><payload>`, length covering id and payload.
pub struct MessageCodec {
    max_length: usize,
}

impl MessageCodec {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        // Fields are range-checked before any byte of the frame is written.
        dst.reserve(item.transport_bytes());
        match item {
            Message::KeepAlive => dst.put_u32(0),
            Message::Choke => put_header(dst, ID_CHOKE, 0)?,
            Message::Unchoke => put_header(dst, ID_UNCHOKE, 0)?,
            Message::Interested => put_header(dst, ID_INTERESTED, 0)?,
            Message::NotInterested => put_header(dst, ID_NOT_INTERESTED, 0)?,
            Message::Have(piece) => {
                let piece = to_u32(piece, "piece index")?;
                put_header(dst, ID_HAVE, 4)?;
                dst.put_u32(piece);
            }
            Message::Bitfield(bitfield) => {
                let bytes = bitfield.to_bytes();
                put_header(dst, ID_BITFIELD, bytes.len())?;
                dst.extend_from_slice(&bytes);
            }
            Message::Request(block) => encode_block(dst, ID_REQUEST, block)?,
            Message::Piece(BlockData {
                piece,
                offset,
                data,
            }) => {
                let piece = to_u32(piece, "piece index")?;
                let offset = to_u32(offset, "block offset")?;
                put_header(dst, ID_PIECE, 8 + data.len())?;
                dst.put_u32(piece);
                dst.put_u32(offset);
                dst.extend_from_slice(&data);
            }
            Message::Cancel(block) => encode_block(dst, ID_CANCEL, block)?,
            Message::Port(port) => {
                put_header(dst, ID_PORT, 2)?;
                dst.put_u16(port);
            }
            Message::Unknown { id, payload } => {
                put_header(dst, id, payload.len())?;
                dst.extend_from_slice(&payload);
            }
        }
        Ok(())
    }
}

fn to_u32(value: usize, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Protocol(format!("{} {} does not fit in 32 bits", field, value)))
}

fn put_header(dst: &mut BytesMut, id: u8, payload_length: usize) -> Result<()> {
    let length = to_u32(payload_length.saturating_add(1), "frame length")?;
    dst.put_u32(length);
    dst.put_u8(id);
    Ok(())
}

fn encode_block(dst: &mut BytesMut, id: u8, block: Block) -> Result<()> {
    let piece = to_u32(block.piece, "piece index")?;
    let offset = to_u32(block.offset, "block offset")?;
    let length = to_u32(block.length, "block length")?;
    put_header(dst, id, 12)?;
    dst.put_u32(piece);
    dst.put_u32(offset);
    dst.put_u32(length);
    Ok(())
}

impl Decoder for MessageCodec {
    type Error = Error;
    type Item = Message;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_SIZE {
            // Not enough data to read length marker.
            return Ok(None);
        }

        let mut length_bytes = [0; LENGTH_SIZE];
        length_bytes.copy_from_slice(&src[0..LENGTH_SIZE]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length == 0 {
            src.advance(LENGTH_SIZE);
            return Ok(Some(Message::KeepAlive));
        }

        if length > self.max_length {
            return Err(Error::Protocol(format!(
                "message length {} exceeds maximum of {}",
                length, self.max_length
            )));
        }

        if src.len() < LENGTH_SIZE + length {
            src.reserve(LENGTH_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_SIZE);
        let id = src.get_u8();
        let payload_length = length - 1;
        let message = match (id, payload_length) {
            (ID_CHOKE, 0) => Message::Choke,
            (ID_UNCHOKE, 0) => Message::Unchoke,
            (ID_INTERESTED, 0) => Message::Interested,
            (ID_NOT_INTERESTED, 0) => Message::NotInterested,
            (ID_HAVE, 4) => Message::Have(src.get_u32() as usize),
            (ID_BITFIELD, _) => {
                let bitfield = Bitfield::from_bytes(&src[0..payload_length]);
                src.advance(payload_length);
                Message::Bitfield(bitfield)
            }
            (ID_REQUEST, 12) => Message::Request(decode_block(src)),
            (ID_PIECE, 8..) => {
                let piece = src.get_u32() as usize;
                let offset = src.get_u32() as usize;
                let data = src.split_to(payload_length - 8).to_vec();
                Message::Piece(BlockData {
                    piece,
                    offset,
                    data,
                })
            }
            (ID_CANCEL, 12) => Message::Cancel(decode_block(src)),
            (ID_PORT, 2) => Message::Port(src.get_u16()),
            (ID_CHOKE..=ID_PORT, _) => {
                src.advance(payload_length);
                return Err(Error::Protocol(format!(
                    "invalid payload length {} for message id {}",
                    payload_length, id
                )));
            }
            _ => Message::Unknown {
                id,
                payload: src.split_to(payload_length).to_vec(),
            },
        };
        Ok(Some(message))
    }
}

fn decode_block(src: &mut BytesMut) -> Block {
    let piece = src.get_u32() as usize;
    let offset = src.get_u32() as usize;
    let length = src.get_u32() as usize;
    Block::new(piece, offset, length)
}

impl TransportMessage for Message {
    fn transport_bytes(&self) -> usize {
        let payload_size = match self {
            Self::KeepAlive => 0,
            Self::Choke => 1,
            Self::Unchoke => 1,
            Self::Interested => 1,
            Self::NotInterested => 1,
            Self::Have(_) => 5,
            Self::Bitfield(bitfield) => 1 + bitfield.capacity() / 8,
            Self::Request(_) => 13,
            Self::Piece(block) => 9 + block.data.len(),
            Self::Cancel(_) => 13,
            Self::Port(_) => 3,
            Self::Unknown { payload, .. } => 1 + payload.len(),
        };
        LENGTH_SIZE + payload_size
    }
}
