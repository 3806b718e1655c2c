//! Output descriptor recorded on a completed export.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::watermark::WatermarkPreset;

/// Where and what the rendered file is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputDescriptor {
    /// Public URL (object storage) or local-path URL
    pub url: String,
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// Seconds
    pub duration: f64,
    pub format: String,
    /// "WxH"
    pub resolution: String,
    pub watermark: WatermarkInfo,
    pub storage: StorageInfo,
}

/// Whether a watermark was burned in, and which one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WatermarkInfo {
    pub applied: bool,
    /// Requested preset, recorded even when nothing was burned in
    #[serde(default)]
    pub preset: WatermarkPreset,
}

/// Storage backend that holds the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Local,
}

/// Storage location of the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StorageInfo {
    pub provider: StorageProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Absolute local path (local provider only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StorageInfo {
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider: StorageProvider::S3,
            bucket: Some(bucket.into()),
            key: Some(key.into()),
            path: None,
        }
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self {
            provider: StorageProvider::Local,
            bucket: None,
            key: None,
            path: Some(path.into()),
        }
    }
}
