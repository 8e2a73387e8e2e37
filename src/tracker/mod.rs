mod request;
mod response;

use std::io::Write;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::info;
use url::Url;

use crate::bencoding::Parser;
use crate::error::Error;

pub use request::TrackerRequest;
pub use response::{Peer, TrackerResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Announces to an HTTP tracker and returns its peer list.
///
/// Trackers with any scheme other than `http` or `https` fail with [`Error::Capability`].
pub async fn announce(request: &TrackerRequest) -> Result<TrackerResponse> {
    let scheme = request.announce.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::Capability(format!("tracker scheme {:?}", scheme)).into());
    }

    let url = Url::from(request);
    info!("announcing to {}", request.announce);
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(anyhow!("tracker returned status {}", response.status()));
    }
    let value = {
        let mut parser = Parser::new();
        while let Some(chunk) = response.chunk().await? {
            parser.write_all(&chunk)?;
        }
        parser.result()?
    };
    let response = TrackerResponse::try_from(value)?;
    info!("tracker returned {} peers", response.peers.len());
    Ok(response)
}
