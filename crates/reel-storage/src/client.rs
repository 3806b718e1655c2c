//! S3 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::keys::object_url;

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Custom endpoint for S3-compatible providers; AWS when unset
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for most S3-compatible providers)
    pub region: String,
    /// Base URL objects are publicly served from
    pub public_base_url: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl StorageConfig {
    /// Create config from environment variables.
    ///
    /// Returns `None` unless `S3_BUCKET`, `S3_ACCESS_KEY_ID` and
    /// `S3_SECRET_ACCESS_KEY` are all set; exports are then kept locally.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            bucket_name: env_opt("S3_BUCKET")?,
            access_key_id: env_opt("S3_ACCESS_KEY_ID")?,
            secret_access_key: env_opt("S3_SECRET_ACCESS_KEY")?,
            endpoint_url: env_opt("S3_ENDPOINT"),
            region: env_opt("S3_REGION").unwrap_or_else(|| "auto".to_string()),
            public_base_url: env_opt("S3_PUBLIC_BASE_URL"),
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3Client {
    /// Create a new client from configuration.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        if config.bucket_name.trim().is_empty() {
            return Err(StorageError::config_error("bucket name is empty"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "reel-export",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        })
    }

    /// Create from environment variables, if storage is configured.
    pub fn from_env() -> StorageResult<Option<Self>> {
        StorageConfig::from_env().map(Self::new).transpose()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public or `s3://` URL for a key.
    pub fn url_for(&self, key: &str) -> String {
        object_url(self.public_base_url.as_deref(), &self.bucket, key)
    }

    /// Upload a file.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}/{}", path.display(), self.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    /// Check that the bucket is reachable with the configured credentials.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        Ok(())
    }
}
