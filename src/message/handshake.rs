use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{AsyncDecoder, AsyncEncoder, TransportMessage};
use crate::core::PeerId;
use crate::crypto::Sha1;
use crate::error::{Error, Result};

pub const PROTOCOL: &str = "BitTorrent protocol";

/// Reserved, info hash and peer id bytes following the protocol string.
const TAIL_SIZE: usize = 8 + 20 + 20;

/// The handshake is a required message and must be the first message transmitted by the client. It
/// is (49+len(pstr)) bytes long.
///
/// _handshake: <pstrlen><pstr><reserved><info\_hash><peer\_id>_
///
/// * **pstrlen**: string length of <pstr>, as a single raw byte
/// * **pstr**: string identifier of the protocol
/// * **reserved**: eight (8) reserved bytes, all zero
/// * **info\_hash**: 20-byte SHA1 hash of the info key in the metainfo file
/// * **peer\_id**: 20-byte string used as a unique ID for the client
#[derive(Debug, PartialEq, Clone)]
pub struct Handshake {
    pub protocol: String,
    pub info_hash: Sha1,
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(info_hash: Sha1, peer_id: PeerId) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            info_hash,
            peer_id,
        }
    }
}

impl AsyncDecoder for Handshake {
    async fn decode<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Self> {
        let length = stream.read_u8().await.map_err(truncated)? as usize;
        if length == 0 {
            return Err(Error::protocol("handshake protocol length is 0"));
        }
        let mut buf = vec![0; length + TAIL_SIZE];
        stream.read_exact(&mut buf).await.map_err(truncated)?;

        let protocol = String::from_utf8_lossy(&buf[..length]).into_owned();
        let mut info_hash = [0; 20];
        info_hash.copy_from_slice(&buf[length + 8..length + 28]);
        let mut peer_id = [0; 20];
        peer_id.copy_from_slice(&buf[length + 28..]);
        Ok(Handshake {
            protocol,
            info_hash: Sha1(info_hash),
            peer_id: PeerId(peer_id),
        })
    }
}

fn truncated(err: std::io::Error) -> Error {
    if err.kind() == ErrorKind::UnexpectedEof {
        Error::protocol("peer closed the connection mid-handshake")
    } else {
        Error::Io(err)
    }
}

impl AsyncEncoder for Handshake {
    async fn encode<S: AsyncWrite + Unpin>(&self, stream: &mut S) -> Result<()> {
        let len: u8 = self
            .protocol
            .len()
            .try_into()
            .map_err(|_| Error::protocol("protocol string too long"))?;
        let mut buf = Vec::with_capacity(self.transport_bytes());
        buf.push(len);
        buf.extend_from_slice(self.protocol.as_bytes());
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&self.info_hash.0);
        buf.extend_from_slice(&self.peer_id.0);
        stream.write_all(&buf).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl TransportMessage for Handshake {
    fn transport_bytes(&self) -> usize {
        1 + // pstr len
            self.protocol.len() + // pstr bytes
            8 + // reserved
            20 + // info hash
            20 // peer id
    }
}
