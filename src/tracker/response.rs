use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Error, Result, anyhow};

use crate::bencoding::Value;

const COMPACT_PEER_LEN: usize = 6;

#[derive(Debug, PartialEq)]
pub struct TrackerResponse {
    /// How long to wait before announcing again.
    pub interval: Duration,
    pub complete: Option<usize>,
    pub incomplete: Option<usize>,
    pub peers: Vec<Peer>,
}

impl TryFrom<Value> for TrackerResponse {
    type Error = Error;

    fn try_from(mut value: Value) -> Result<Self> {
        if let Some(reason) = value.try_remove_entry("failure reason")? {
            let reason: String = reason.try_into()?;
            return Err(anyhow!("tracker failure: {}", reason));
        }
        let interval = value.remove_entry("interval")?.try_into()?;
        let complete = optional(&mut value, "complete")?;
        let incomplete = optional(&mut value, "incomplete")?;
        let peers = match value.remove_entry("peers")? {
            Value::String(compact) => Peer::from_compact(&compact)?,
            peers => {
                let peers: Vec<Value> = peers.try_into()?;
                peers
                    .into_iter()
                    .map(Peer::try_from)
                    .collect::<Result<_>>()?
            }
        };
        Ok(TrackerResponse {
            interval,
            complete,
            incomplete,
            peers,
        })
    }
}

fn optional(value: &mut Value, key: &str) -> Result<Option<usize>> {
    value
        .try_remove_entry(key)?
        .map(usize::try_from)
        .transpose()
}

#[derive(Debug, PartialEq)]
pub struct Peer {
    pub peer_id: Option<Vec<u8>>,
    pub addr: SocketAddr,
}

impl Peer {
    /// Parses the compact form: 4 bytes of IPv4 address then 2 bytes of port, both big-endian.
    fn from_compact(bytes: &[u8]) -> Result<Vec<Self>> {
        if bytes.len() % COMPACT_PEER_LEN != 0 {
            return Err(anyhow!(
                "invalid compact peers length {}, must be a multiple of {}",
                bytes.len(),
                COMPACT_PEER_LEN
            ));
        }
        Ok(bytes
            .chunks_exact(COMPACT_PEER_LEN)
            .map(|chunk| {
                let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
                let port = u16::from_be_bytes([chunk[4], chunk[5]]);
                Peer {
                    peer_id: None,
                    addr: SocketAddr::new(IpAddr::V4(ip), port),
                }
            })
            .collect())
    }
}

impl TryFrom<Value> for Peer {
    type Error = Error;

    fn try_from(mut value: Value) -> Result<Self> {
        let peer_id = match value.try_remove_entry("peer id")? {
            Some(peer_id) => Some(peer_id.try_into()?),
            None => None,
        };
        let port = value.remove_entry("port")?.try_into()?;
        let ip: String = value.remove_entry("ip")?.try_into()?;
        let ip: IpAddr = ip.parse()?;
        Ok(Peer {
            peer_id,
            addr: SocketAddr::new(ip, port),
        })
    }
}
