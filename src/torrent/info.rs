use anyhow::{Error, Result, anyhow};

use crate::bencoding::Value;
use crate::crypto::Sha1;

const SHA1_LEN: usize = 20;

/// The `info` section of a single-file torrent.
#[derive(Debug, PartialEq, Clone)]
pub struct Info {
    /// SHA-1 of the canonical encoding of the whole `info` dictionary
    pub info_hash: Sha1,
    pub name: String,
    pub piece_size: usize,
    /// Total content length in bytes
    pub length: usize,
    pub pieces: Vec<Sha1>,
}

impl Info {
    fn build_pieces(pieces: &[u8]) -> Result<Vec<Sha1>> {
        if pieces.len() % SHA1_LEN != 0 {
            return Err(anyhow!(
                "invalid pieces length {}, must be a multiple of {}",
                pieces.len(),
                SHA1_LEN
            ));
        }
        Ok(pieces
            .chunks_exact(SHA1_LEN)
            .map(|chunk| {
                let mut bytes = [0; SHA1_LEN];
                bytes.copy_from_slice(chunk);
                Sha1(bytes)
            })
            .collect())
    }
}

impl TryFrom<Value> for Info {
    type Error = Error;

    fn try_from(mut value: Value) -> Result<Self> {
        let info_hash = Sha1::digest(&value.to_bytes());
        let name = value.remove_entry("name")?.try_into()?;
        let piece_size: usize = value.remove_entry("piece length")?.try_into()?;
        if piece_size == 0 {
            return Err(anyhow!("piece length must be positive"));
        }
        if value.has_entry("files") {
            return Err(anyhow!("multi-file torrents are not supported"));
        }
        let length: usize = value.remove_entry("length")?.try_into()?;
        let pieces: Vec<u8> = value.remove_entry("pieces")?.try_into()?;
        let pieces = Info::build_pieces(&pieces)?;
        let expected = length.div_ceil(piece_size);
        if pieces.len() != expected {
            return Err(anyhow!(
                "expected {} piece hashes for {} bytes, got {}",
                expected,
                length,
                pieces.len()
            ));
        }
        Ok(Info {
            info_hash,
            name,
            piece_size,
            length,
            pieces,
        })
    }
}
