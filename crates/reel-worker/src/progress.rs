//! Progress reporting to the orchestration API.
//!
//! Phases map to fixed percentages; clip rendering advances linearly between
//! 20 and 60. Reported values never decrease.

use std::fmt;

use tracing::warn;

use reel_models::{ErrorDescriptor, OutputDescriptor, ProcessingInfo, StatusUpdate};
use reel_orchestrator::{ApiError, ApiResult};

use crate::error::WorkerResult;
use crate::executor::StatusApi;
use crate::retry::{retry_async_when, RetryConfig};

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    ProcessingClips,
    ApplyingTransitions,
    ApplyingWatermark,
    Finalizing,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::ProcessingClips => "processing_clips",
            Phase::ApplyingTransitions => "applying_transitions",
            Phase::ApplyingWatermark => "applying_watermark",
            Phase::Finalizing => "finalizing",
            Phase::Complete => "complete",
        }
    }

    /// Percentage for this phase; `counts` is `(done, total)` clips.
    pub fn progress(&self, counts: Option<(u32, u32)>) -> u8 {
        match self {
            Phase::Initializing => 5,
            Phase::ProcessingClips => match counts {
                Some((done, total)) if total > 0 => {
                    let done = done.min(total);
                    (20 + 40 * done / total) as u8
                }
                _ => 20,
            },
            Phase::ApplyingTransitions => 60,
            Phase::ApplyingWatermark => 80,
            Phase::Finalizing => 90,
            Phase::Complete => 100,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends status updates for one job.
pub struct ProgressReporter<'a> {
    api: &'a dyn StatusApi,
    job_id: String,
    strict: bool,
    retry: RetryConfig,
    last_sent: u8,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(api: &'a dyn StatusApi, job_id: impl Into<String>) -> Self {
        Self {
            api,
            job_id: job_id.into(),
            strict: false,
            retry: RetryConfig::new("status_update"),
            last_sent: 0,
        }
    }

    /// Treat undeliverable progress updates as job failures.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Last progress value the API accepted.
    pub fn last_progress(&self) -> u8 {
        self.last_sent
    }

    async fn send(&self, update: &StatusUpdate) -> ApiResult<()> {
        retry_async_when(&self.retry, ApiError::is_retryable, || {
            self.api.update_status(&self.job_id, update)
        })
        .await
    }

    /// Move the job to `processing`. Always fatal on failure.
    pub async fn start(&mut self) -> WorkerResult<()> {
        let progress = Phase::Initializing.progress(None);
        let update = StatusUpdate::processing(
            progress,
            ProcessingInfo::new(Phase::Initializing.as_str()),
        );
        self.send(&update).await?;
        self.last_sent = progress;
        Ok(())
    }

    /// Report an intermediate phase.
    ///
    /// Delivery failures are logged and skipped unless the reporter is strict.
    pub async fn report(&mut self, phase: Phase, counts: Option<(u32, u32)>) -> WorkerResult<()> {
        let progress = phase.progress(counts).max(self.last_sent);

        let mut info = ProcessingInfo::new(phase.as_str());
        if let Some((done, total)) = counts {
            info = info.with_counts(done, total);
        }
        let update = StatusUpdate::progress(progress, info);

        match self.send(&update).await {
            Ok(()) => {
                self.last_sent = progress;
                Ok(())
            }
            Err(e) if self.strict => Err(e.into()),
            Err(e) => {
                warn!(
                    job_id = %self.job_id,
                    phase = %phase,
                    progress,
                    "Progress update not delivered, continuing: {}",
                    e
                );
                Ok(())
            }
        }
    }

    /// Terminal success.
    pub async fn complete(&mut self, output: OutputDescriptor) -> WorkerResult<()> {
        self.send(&StatusUpdate::completed(output)).await?;
        self.last_sent = Phase::Complete.progress(None);
        Ok(())
    }

    /// Terminal failure.
    pub async fn fail(&self, error: ErrorDescriptor) -> WorkerResult<()> {
        self.send(&StatusUpdate::failed(error)).await?;
        Ok(())
    }
}
