//! Output finalization: storage placement and the output descriptor.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use reel_media::fs_utils::move_file;
use reel_models::{ExportJob, OutputDescriptor, StorageInfo, WatermarkInfo};
use reel_storage::{export_key, S3Client, StorageResult};

use crate::error::{WorkerError, WorkerResult};

const CONTENT_TYPE: &str = "video/mp4";
const OUTPUT_FORMAT: &str = "mp4";

/// Durable object storage for finished exports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> String;

    fn url_for(&self, key: &str) -> String;

    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> String {
        S3Client::bucket(self).to_string()
    }

    fn url_for(&self, key: &str) -> String {
        S3Client::url_for(self, key)
    }

    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        self.upload_file(path, key, content_type).await
    }
}

/// What the render stages produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedOutput {
    /// Seconds, after transition overlaps
    pub duration: f64,
    pub watermark_applied: bool,
}

/// File name for an export: slugged job name plus job id.
pub fn output_file_name(job: &ExportJob) -> String {
    let mut slug = String::new();
    for c in job.name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 48 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');

    let id: String = job
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    match (slug.is_empty(), id.is_empty()) {
        (true, true) => format!("export.{}", OUTPUT_FORMAT),
        (true, false) => format!("export_{}.{}", id, OUTPUT_FORMAT),
        (false, true) => format!("{}.{}", slug, OUTPUT_FORMAT),
        (false, false) => format!("{}_{}.{}", slug, id, OUTPUT_FORMAT),
    }
}

/// Place the final file and describe it.
///
/// With object storage the file is uploaded under `exports/{user}/{file}`;
/// otherwise it is moved to the same relative path below `uploads_dir`.
pub async fn finalize(
    path: &Path,
    job: &ExportJob,
    rendered: RenderedOutput,
    store: Option<&dyn ObjectStore>,
    uploads_dir: &Path,
) -> WorkerResult<OutputDescriptor> {
    let size = tokio::fs::metadata(path).await?.len();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| WorkerError::config_error(format!("bad output path {}", path.display())))?;
    let key = export_key(&job.user_id, &file_name)?;

    let (url, storage) = match store {
        Some(store) => {
            store.upload(path, &key, CONTENT_TYPE).await?;
            let bucket = store.bucket();
            info!(bucket = %bucket, key = %key, size, "Uploaded export");
            (store.url_for(&key), StorageInfo::s3(bucket, key))
        }
        None => {
            let dest = uploads_dir.join(&key);
            move_file(path, &dest).await?;
            let stored = match tokio::fs::canonicalize(&dest).await {
                Ok(stored) => stored,
                Err(_) => dest,
            };
            info!(path = %stored.display(), size, "Stored export locally");
            (
                format!("/uploads/{}", key),
                StorageInfo::local(stored.to_string_lossy()),
            )
        }
    };

    let (width, height) = job.settings.dimensions();
    let watermark = WatermarkInfo {
        applied: rendered.watermark_applied,
        preset: job.watermark_settings.preset,
    };

    Ok(OutputDescriptor {
        url,
        file_name,
        size,
        duration: rendered.duration,
        format: OUTPUT_FORMAT.to_string(),
        resolution: format!("{}x{}", width, height),
        watermark,
        storage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{StorageProvider, WatermarkPreset, WatermarkSettings};
    use reel_storage::StorageError;
    use tempfile::TempDir;

    fn job() -> ExportJob {
        serde_json::from_value(serde_json::json!({
            "id": "exp_42",
            "userId": "user_7",
            "name": "Summer Trip: Day #1",
            "watermarkSettings": {"enabled": true, "preset": "branded"}
        }))
        .unwrap()
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(&job()), "summer-trip-day-1_exp_42.mp4");

        let mut unnamed = job();
        unnamed.name = "  !!  ".into();
        assert_eq!(output_file_name(&unnamed), "export_exp_42.mp4");
    }

    #[tokio::test]
    async fn test_local_storage_descriptor() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, vec![0u8; 321]).await.unwrap();

        let rendered = RenderedOutput {
            duration: 5.0,
            watermark_applied: true,
        };
        let output = finalize(&path, &job(), rendered, None, &uploads).await.unwrap();

        assert_eq!(output.storage.provider, StorageProvider::Local);
        assert_eq!(output.url, "/uploads/exports/user_7/out.mp4");
        assert_eq!(output.size, 321);
        assert_eq!(output.resolution, "1080x1920");
        assert_eq!(output.watermark.preset, WatermarkPreset::Branded);
        let stored = std::fs::canonicalize(uploads.join("exports/user_7/out.mp4")).unwrap();
        assert_eq!(output.storage.path.as_deref(), stored.to_str());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_s3_storage_descriptor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, b"frames").await.unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_upload()
            .withf(|_, key, content_type| key == "exports/user_7/out.mp4" && content_type == "video/mp4")
            .times(1)
            .returning(|_, _, _| Ok(()));
        store.expect_bucket().return_const("exports-bucket".to_string());
        store
            .expect_url_for()
            .returning(|key| format!("https://cdn.test/{}", key));

        let mut job = job();
        job.watermark_settings = WatermarkSettings::default();
        let rendered = RenderedOutput {
            duration: 8.5,
            watermark_applied: false,
        };
        let output = finalize(&path, &job, rendered, Some(&store), dir.path())
            .await
            .unwrap();

        assert_eq!(output.storage.provider, StorageProvider::S3);
        assert_eq!(output.storage.bucket.as_deref(), Some("exports-bucket"));
        assert_eq!(output.storage.key.as_deref(), Some("exports/user_7/out.mp4"));
        assert_eq!(output.url, "https://cdn.test/exports/user_7/out.mp4");
        assert!(!output.watermark.applied);
        assert_eq!(output.watermark.preset, WatermarkPreset::Minimal);
    }

    #[tokio::test]
    async fn test_upload_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, b"frames").await.unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_upload()
            .returning(|_, _, _| Err(StorageError::upload_failed("denied")));

        let rendered = RenderedOutput {
            duration: 1.0,
            watermark_applied: false,
        };
        let err = finalize(&path, &job(), rendered, Some(&store), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Storage(_)));
    }
}
