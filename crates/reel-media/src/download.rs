//! Streaming download of remote media into the job workspace.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Extension used when the URL path has none.
const DEFAULT_EXTENSION: &str = "mp4";

/// File extension taken from a URL's path, ignoring query and fragment.
pub fn extension_from_url(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(|e| e.to_ascii_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Download `url` to `dir/{stem}.{ext}`, returning the final path.
///
/// The body is streamed to a `.part` file that is renamed once complete, so
/// an interrupted download never leaves a file at the final path.
pub async fn download_to_dir(
    client: &reqwest::Client,
    url: &str,
    dir: impl AsRef<Path>,
    stem: &str,
) -> MediaResult<PathBuf> {
    let dest = dir
        .as_ref()
        .join(format!("{}.{}", stem, extension_from_url(url)));
    download_to_file(client, url, &dest).await?;
    Ok(dest)
}

/// Download `url` to `dest`. Returns the number of bytes written.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: impl AsRef<Path>,
) -> MediaResult<u64> {
    let dest = dest.as_ref();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    debug!("Downloading {} -> {}", url, dest.display());

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::download_failed(format!(
            "GET {} returned {}",
            url, status
        )));
    }

    let part = dest.with_extension("part");
    let mut file = fs::File::create(&part).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&part).await;
                return Err(MediaError::download_failed(format!(
                    "Stream from {} interrupted: {}",
                    url, e
                )));
            }
        };
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    drop(file);

    if written == 0 {
        let _ = fs::remove_file(&part).await;
        return Err(MediaError::download_failed(format!("{} returned an empty body", url)));
    }

    fs::rename(&part, dest).await?;
    info!("Downloaded {} bytes from {}", written, url);

    Ok(written)
}
