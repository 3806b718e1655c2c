//! Filesystem helpers for moving and copying render artifacts.
//!
//! Work directories and the uploads directory may live on different
//! filesystems, so moves fall back to copy-and-delete on EXDEV.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, creating the destination directory.
///
/// Tries a rename first; on a cross-device error the file is copied to a
/// temporary sibling of `dst`, renamed into place and the source removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_file(src, dst).await?;
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!("Failed to remove {} after move: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Byte-for-byte copy of `src` to `dst` through a temporary sibling file.
///
/// Returns the number of bytes copied.
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    ensure_parent(dst).await?;

    let tmp_dst = dst.with_extension("tmp");
    let bytes = fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    fs::rename(&tmp_dst, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_dst);
        MediaError::from(e)
    })?;

    Ok(bytes)
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}
