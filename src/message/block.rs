use crate::error::{Error, Result};

/// A byte range within a piece, as carried by **request** and **cancel** messages.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub struct Block {
    pub piece: usize,
    pub offset: usize,
    pub length: usize,
}

impl Block {
    pub fn new(piece: usize, offset: usize, length: usize) -> Self {
        Self {
            piece,
            offset,
            length,
        }
    }
}

/// Payload of a **piece** message.
#[derive(Debug, PartialEq, Clone)]
pub struct BlockData {
    pub piece: usize,
    pub offset: usize,
    pub data: Vec<u8>,
}

impl BlockData {
    /// Copies the block into `buf` (the buffer of piece `expected_piece`) at its offset.
    ///
    /// Returns the number of bytes copied. Nothing is written when the block belongs to another
    /// piece or would not fit in `buf`.
    pub fn copy_into(&self, expected_piece: usize, buf: &mut [u8]) -> Result<usize> {
        if self.piece != expected_piece {
            return Err(Error::Protocol(format!(
                "expected piece index {}, got {}",
                expected_piece, self.piece
            )));
        }
        let end = self
            .offset
            .checked_add(self.data.len())
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "block of {} bytes at offset {} overflows piece of {} bytes",
                    self.data.len(),
                    self.offset,
                    buf.len()
                ))
            })?;
        buf[self.offset..end].copy_from_slice(&self.data);
        Ok(self.data.len())
    }
}
