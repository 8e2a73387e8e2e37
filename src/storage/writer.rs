use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Resolves where the download lands. A directory gets `name` appended. An existing file is
/// refused rather than overwritten.
pub async fn output_path(output: &Path, name: &str) -> Result<PathBuf> {
    let path = match tokio::fs::metadata(output).await {
        Ok(metadata) if metadata.is_dir() => output.join(file_name(name)),
        _ => output.to_path_buf(),
    };
    if tokio::fs::try_exists(&path).await? {
        bail!("{} already exists", path.display());
    }
    Ok(path)
}

/// Keeps a torrent-supplied name from escaping the output directory.
fn file_name(name: &str) -> String {
    let name = name.replace(['/', '\\'], "_");
    match name.trim() {
        "" | "." | ".." => "download".to_string(),
        _ => name,
    }
}

/// Writes the assembled content to a new file at `path`.
pub async fn write(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("unable to create {}", path.display()))?;
    file.write_all(data).await?;
    file.flush().await?;
    info!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
