//! Orchestration API HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use reel_models::{ExportJob, StatusUpdate};

use crate::error::{ApiError, ApiResult};

/// Header carrying the shared worker secret.
pub const WORKER_SECRET_HEADER: &str = "x-worker-secret";

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.example.com/api`
    pub base_url: String,
    /// Shared secret sent with every request
    pub worker_secret: String,
    /// Request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, worker_secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            worker_secret: worker_secret.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create config from environment variables.
    ///
    /// `API_BASE_URL` and `WORKER_SECRET` are required.
    pub fn from_env() -> ApiResult<Self> {
        let base_url = required_env("API_BASE_URL")?;
        let worker_secret = required_env("WORKER_SECRET")?;

        let mut config = Self::new(base_url, worker_secret);
        config.timeout = Duration::from_secs(
            std::env::var("API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        );
        Ok(config)
    }
}

fn required_env(key: &str) -> ApiResult<String> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::config(format!("{} is not set", key)))
}

/// Response envelope used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobData {
    export_job: ExportJob,
}

/// Client for the orchestration API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Self::new(ApiConfig::from_env()?)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn job_url(&self, job_id: &str) -> String {
        format!(
            "{}/export/jobs/{}",
            self.config.base_url,
            urlencoding::encode(job_id)
        )
    }

    /// Fetch full job details.
    pub async fn fetch_job(&self, job_id: &str) -> ApiResult<ExportJob> {
        let url = self.job_url(job_id);
        debug!("Fetching export job from {}", url);

        let response = self
            .http
            .get(&url)
            .header(WORKER_SECRET_HEADER, &self.config.worker_secret)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(job_id.to_string()));
        }

        let data: JobData = read_envelope(response)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse("missing data.exportJob".into()))?;
        Ok(data.export_job)
    }

    /// Post a status update for a job.
    pub async fn update_status(&self, job_id: &str, update: &StatusUpdate) -> ApiResult<()> {
        let url = format!("{}/status", self.job_url(job_id));
        debug!(
            status = ?update.status,
            progress = ?update.progress,
            "Posting status update to {}",
            url
        );

        let response = self
            .http
            .post(&url)
            .header(WORKER_SECRET_HEADER, &self.config.worker_secret)
            .json(update)
            .send()
            .await?;

        read_envelope::<serde_json::Value>(response).await?;
        Ok(())
    }
}

/// Check status and the `success` flag, returning `data`.
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<Option<T>> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("Orchestration API returned {}: {}", status, body);
        return Err(ApiError::from_http_status(status.as_u16(), body));
    }

    // 204 and other bodiless 2xx replies acknowledge without data
    if body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        let reason = envelope
            .error
            .or(envelope.message)
            .unwrap_or_else(|| "success=false".to_string());
        return Err(ApiError::Rejected(reason));
    }

    Ok(envelope.data)
}
