//! Resolution of clip media to something FFmpeg can read.
//!
//! Resolution never fails: media that is missing, unreadable or cannot be
//! downloaded is replaced by a deterministic placeholder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use reel_models::{Clip, MediaDescriptor};

use crate::download::download_to_dir;
use crate::placeholder::Placeholder;

/// Where a clip's frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipSource {
    File(PathBuf),
    Placeholder(Placeholder),
}

impl ClipSource {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ClipSource::Placeholder(_))
    }
}

/// Resolves media descriptors for one job.
///
/// Remote media is downloaded at most once per media id; the outcome
/// (including failure) is remembered for later clips.
pub struct MediaResolver {
    uploads_dir: PathBuf,
    media_dir: PathBuf,
    http: reqwest::Client,
    downloaded: HashMap<String, Option<PathBuf>>,
}

impl MediaResolver {
    pub fn new(uploads_dir: impl Into<PathBuf>, media_dir: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            media_dir: media_dir.into(),
            http,
            downloaded: HashMap::new(),
        }
    }

    /// Source for a clip, given its media descriptor if the job has one.
    pub async fn resolve(&mut self, clip: &Clip, media: Option<&MediaDescriptor>) -> ClipSource {
        let resolved = match media {
            Some(media) if media.is_remote() => self.fetch_remote(media).await,
            Some(media) => self.local_path(&media.url),
            None => {
                warn!(clip_id = %clip.id, media_id = ?clip.media_id, "Clip has no media descriptor");
                None
            }
        };

        match resolved {
            Some(path) => ClipSource::File(path),
            None => {
                let placeholder = Placeholder::for_clip(&clip.id);
                warn!(
                    clip_id = %clip.id,
                    pattern = placeholder.pattern.source_name(),
                    "Media unavailable, rendering placeholder"
                );
                metrics::counter!("reel_placeholder_clips_total").increment(1);
                ClipSource::Placeholder(placeholder)
            }
        }
    }

    /// Map a stored URL onto the local filesystem.
    ///
    /// Accepts `file://` URLs, absolute paths that exist, and paths relative
    /// to the uploads directory (with or without a leading `/uploads/`).
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        let raw = url.strip_prefix("file://").unwrap_or(url);
        if raw.is_empty() {
            return None;
        }

        let direct = Path::new(raw);
        if direct.is_absolute() && direct.is_file() {
            return Some(direct.to_path_buf());
        }

        let relative = raw.trim_start_matches('/');
        let relative = relative.strip_prefix("uploads/").unwrap_or(relative);
        let candidate = self.uploads_dir.join(relative);
        if candidate.is_file() {
            Some(candidate)
        } else {
            debug!("Local media not found: {}", candidate.display());
            None
        }
    }

    async fn fetch_remote(&mut self, media: &MediaDescriptor) -> Option<PathBuf> {
        if let Some(cached) = self.downloaded.get(&media.id) {
            return cached.clone();
        }

        let stem = format!("media-{}", self.downloaded.len());
        let result = match download_to_dir(&self.http, &media.url, &self.media_dir, &stem).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(media_id = %media.id, "Failed to download media: {}", e);
                None
            }
        };

        self.downloaded.insert(media.id.clone(), result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn clip(id: &str) -> Clip {
        Clip {
            id: id.into(),
            media_id: Some("m1".into()),
            duration: 2.0,
            ..Default::default()
        }
    }

    fn resolver(dir: &TempDir) -> MediaResolver {
        MediaResolver::new(
            dir.path().join("uploads"),
            dir.path().join("media"),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn test_resolves_uploads_relative_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("uploads").join("user-1").join("a.mp4");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"x").unwrap();

        let mut resolver = resolver(&dir);
        let media = MediaDescriptor::new("m1", "/uploads/user-1/a.mp4");
        let source = resolver.resolve(&clip("c1"), Some(&media)).await;

        assert_eq!(source, ClipSource::File(file));
    }

    #[tokio::test]
    async fn test_missing_media_falls_back_to_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut resolver = resolver(&dir);

        let missing = MediaDescriptor::new("m1", "/uploads/gone.mp4");
        let first = resolver.resolve(&clip("c1"), Some(&missing)).await;
        let again = resolver.resolve(&clip("c1"), None).await;

        assert_eq!(first, ClipSource::Placeholder(Placeholder::for_clip("c1")));
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_remote_downloaded_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut resolver = resolver(&dir);
        let media = MediaDescriptor::new("m1", format!("{}/v.mp4", server.uri()));

        let a = resolver.resolve(&clip("c1"), Some(&media)).await;
        let b = resolver.resolve(&clip("c2"), Some(&media)).await;

        assert!(matches!(a, ClipSource::File(_)));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_failed_download_uses_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut resolver = resolver(&dir);
        let media = MediaDescriptor::new("m1", format!("{}/v.mp4", server.uri()));

        let source = resolver.resolve(&clip("c9"), Some(&media)).await;
        assert!(source.is_placeholder());
    }
}
