//! S3-compatible object storage for finished exports.
//!
//! This crate provides:
//! - Optional configuration from the environment (no bucket, no upload)
//! - File upload through the AWS SDK with path-style addressing
//! - Export key layout and public URL construction

pub mod client;
pub mod error;
pub mod keys;

pub use client::{S3Client, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use keys::{export_key, object_url};
