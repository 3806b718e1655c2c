//! Object key layout and URLs for exports.

use crate::error::{StorageError, StorageResult};

/// Key prefix for finished exports.
pub const EXPORTS_PREFIX: &str = "exports";

/// Per-user, per-file key: `exports/{user_id}/{file_name}`.
pub fn export_key(user_id: &str, file_name: &str) -> StorageResult<String> {
    let user_id = user_id.trim();
    let file_name = file_name.trim();

    for (what, part) in [("user id", user_id), ("file name", file_name)] {
        if part.is_empty() || part == "." || part == ".." || part.contains('/') || part.contains('\\') {
            return Err(StorageError::InvalidKey(format!("bad {}: {:?}", what, part)));
        }
    }

    Ok(format!("{}/{}/{}", EXPORTS_PREFIX, user_id, file_name))
}

/// Download URL for an uploaded object.
///
/// With a public base URL the key is appended to it, percent-encoding each
/// segment. Without one an `s3://bucket/key` reference is returned.
pub fn object_url(public_base_url: Option<&str>, bucket: &str, key: &str) -> String {
    match public_base_url.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => {
            let encoded: Vec<String> = key
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect();
            format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
        }
        None => format!("s3://{}/{}", bucket, key),
    }
}
