mod info;

use std::path::Path;

use anyhow::{Context, Error, Result};
use tokio::fs::File;
use url::Url;

use crate::bencoding::Value;
use crate::codec::AsyncDecoder;

pub use info::Info;

/// Torrent metainfo.
#[derive(Debug, PartialEq, Clone)]
pub struct Torrent {
    pub announce: Url,
    pub info: Info,
}

impl Torrent {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .await
            .with_context(|| format!("unable to open {}", path.display()))?;
        let value = Value::decode(&mut file)
            .await
            .with_context(|| format!("unable to parse {}", path.display()))?;
        Torrent::try_from(value)
    }
}

impl TryFrom<Value> for Torrent {
    type Error = Error;

    fn try_from(mut value: Value) -> Result<Self> {
        let announce: String = value.remove_entry("announce")?.try_into()?;
        let announce = Url::parse(&announce)?;
        let info = value.remove_entry("info")?.try_into()?;
        Ok(Torrent { announce, info })
    }
}
