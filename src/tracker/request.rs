use size::Size;
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::client::Config;
use crate::core::PeerId;
use crate::crypto::Sha1;
use crate::torrent::Torrent;

/// An announce to an HTTP tracker. Always asks for the compact peer list.
#[derive(Debug, Clone)]
pub struct TrackerRequest {
    pub announce: Url,
    pub info_hash: Sha1,
    pub peer_id: PeerId,
    /// The port number that the client is listening on.
    pub port: u16,
    pub uploaded: Size,
    pub downloaded: Size,
    /// The number of bytes still needed to complete the download.
    pub left: Size,
}

impl TrackerRequest {
    pub fn new(torrent: &Torrent, config: &Config) -> Self {
        Self {
            announce: torrent.announce.clone(),
            info_hash: torrent.info.info_hash,
            peer_id: config.client_id,
            port: config.port,
            uploaded: Size::from_bytes(0),
            downloaded: Size::from_bytes(0),
            left: Size::from_bytes(torrent.info.length),
        }
    }
}

impl From<&TrackerRequest> for Url {
    fn from(value: &TrackerRequest) -> Self {
        let mut url = value.announce.clone();
        let params = format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&compact=1&left={}",
            url_encode(&value.info_hash.0),
            url_encode(&value.peer_id.0),
            value.port,
            value.uploaded.bytes(),
            value.downloaded.bytes(),
            value.left.bytes(),
        );
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, params),
            _ => params,
        };
        url.set_query(Some(&query));
        url
    }
}

fn url_encode(bytes: &[u8]) -> String {
    byte_serialize(bytes).collect()
}
