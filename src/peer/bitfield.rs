use std::fmt::{Debug, Formatter};

use bit_set::BitSet;

/// Pieces a peer has announced. Bit 0 is the high bit of the first byte.
///
/// The capacity is fixed by the payload it was built from: queries past the end report the piece
/// as missing and updates past the end are ignored.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Bitfield {
    bits: BitSet,
}

impl Bitfield {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bits: BitSet::from_bytes(bytes),
        }
    }

    /// An empty bitfield able to hold `pieces` bits, rounded up to whole bytes.
    pub fn with_pieces(pieces: usize) -> Self {
        Self::from_bytes(&vec![0; pieces.div_ceil(8)])
    }

    pub fn has_piece(&self, piece: usize) -> bool {
        self.bits.contains(piece)
    }

    pub fn set_piece(&mut self, piece: usize) {
        if piece < self.capacity() {
            self.bits.insert(piece);
        }
    }

    /// Number of bits addressable, always a multiple of 8.
    pub fn capacity(&self) -> usize {
        self.bits.get_ref().len()
    }

    fn count(&self) -> usize {
        self.bits.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.get_ref().to_bytes()
    }
}

impl Debug for Bitfield {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitfield(<{}/{} pieces>)", self.count(), self.capacity())
    }
}
