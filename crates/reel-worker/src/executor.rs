//! Job executor: claims one export job and drives it to a terminal state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn, Instrument};

use reel_media::Encoder;
use reel_models::{ExportJob, OutputDescriptor, StatusUpdate};
use reel_orchestrator::{ApiClient, ApiError, ApiResult};
use reel_queue::{ClaimedJob, JobQueue, QueueResult};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::finalize::ObjectStore;
use crate::logging::JobLogger;
use crate::pipeline::{render_job, RenderContext};
use crate::progress::ProgressReporter;
use crate::retry::{retry_async_when, RetryConfig};
use crate::workspace::JobWorkspace;

/// The orchestration API as seen by the worker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusApi: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> ApiResult<ExportJob>;

    async fn update_status(&self, job_id: &str, update: &StatusUpdate) -> ApiResult<()>;
}

#[async_trait]
impl StatusApi for ApiClient {
    async fn fetch_job(&self, job_id: &str) -> ApiResult<ExportJob> {
        ApiClient::fetch_job(self, job_id).await
    }

    async fn update_status(&self, job_id: &str, update: &StatusUpdate) -> ApiResult<()> {
        ApiClient::update_status(self, job_id, update).await
    }
}

/// The durable job queue as seen by the worker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn claim(&self) -> QueueResult<Option<ClaimedJob>>;

    async fn complete(&self, job: &ClaimedJob) -> QueueResult<()>;

    async fn fail(&self, job: &ClaimedJob, reason: &str) -> QueueResult<()>;
}

#[async_trait]
impl JobSource for JobQueue {
    async fn claim(&self) -> QueueResult<Option<ClaimedJob>> {
        JobQueue::claim(self).await
    }

    async fn complete(&self, job: &ClaimedJob) -> QueueResult<()> {
        JobQueue::complete(self, &job.id).await
    }

    async fn fail(&self, job: &ClaimedJob, reason: &str) -> QueueResult<()> {
        JobQueue::fail(self, job, reason).await
    }
}

/// Result of one worker invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The queue was empty.
    NoJob,
    /// The payload carried no job reference; failed in the queue only.
    Rejected,
    Completed {
        job_id: String,
        output: Box<OutputDescriptor>,
    },
    Failed {
        job_id: String,
        error: String,
    },
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::NoJob | Outcome::Completed { .. } => 0,
            Outcome::Rejected | Outcome::Failed { .. } => 1,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::NoJob => "no_job",
            Outcome::Rejected => "rejected",
            Outcome::Completed { .. } => "completed",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// Runs at most one export job per call to [`JobExecutor::run_once`].
pub struct JobExecutor {
    queue: Arc<dyn JobSource>,
    api: Arc<dyn StatusApi>,
    encoder: Arc<dyn Encoder>,
    store: Option<Arc<dyn ObjectStore>>,
    http: reqwest::Client,
    config: WorkerConfig,
    retry: RetryConfig,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<dyn JobSource>,
        api: Arc<dyn StatusApi>,
        encoder: Arc<dyn Encoder>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            api,
            encoder,
            store: None,
            http: reqwest::Client::new(),
            config,
            retry: RetryConfig::new("orchestration_api"),
        }
    }

    /// Upload exports to object storage instead of keeping them locally.
    pub fn with_store(mut self, store: Option<Arc<dyn ObjectStore>>) -> Self {
        self.store = store;
        self
    }

    /// HTTP client for remote media downloads.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Backoff for orchestration API calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Claim and process a single job.
    ///
    /// Errors are returned only when the queue itself cannot be reached;
    /// job failures are reported and surface as [`Outcome::Failed`].
    pub async fn run_once(&self) -> WorkerResult<Outcome> {
        let Some(claimed) = self.queue.claim().await? else {
            info!("No export job available");
            return Ok(Outcome::NoJob);
        };

        let outcome = match claimed.data.job_ref().map(str::to_string) {
            Some(job_id) => {
                let logger = JobLogger::new(&job_id, "video_export").with_attempt(claimed.attempt + 1);
                let span = logger.create_span();
                self.execute(&claimed, job_id, &logger).instrument(span).await
            }
            None => self.reject(&claimed).await?,
        };

        metrics::counter!("reel_jobs_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }

    async fn reject(&self, claimed: &ClaimedJob) -> WorkerResult<Outcome> {
        let reason = WorkerError::MissingJobRef.to_string();
        warn!(message_id = %claimed.id, "{}", reason);
        self.queue.fail(claimed, &reason).await?;
        Ok(Outcome::Rejected)
    }

    async fn execute(&self, claimed: &ClaimedJob, job_id: String, logger: &JobLogger) -> Outcome {
        logger.log_start(&claimed.id);

        let mut reporter = ProgressReporter::new(self.api.as_ref(), job_id.as_str())
            .strict(self.config.strict_progress_reporting)
            .with_retry(self.retry.clone());

        match self.process(&job_id, &mut reporter).await {
            Ok(output) => {
                if let Err(e) = self.queue.complete(claimed).await {
                    // Already reported as completed; the entry is reclaimed
                    // after the visibility timeout.
                    logger.log_warning(&format!("Failed to acknowledge queue entry: {}", e));
                }
                logger.log_completion(&output);
                Outcome::Completed {
                    job_id,
                    output: Box::new(output),
                }
            }
            Err(e) => {
                logger.log_failure(&e);

                let message = e.to_string();
                if let Err(qe) = self.queue.fail(claimed, &message).await {
                    error!(job_id = %job_id, "Failed to mark queue entry failed: {}", qe);
                }
                if let Err(re) = reporter.fail(e.to_descriptor()).await {
                    error!(job_id = %job_id, "Failed to report job failure: {}", re);
                }
                Outcome::Failed {
                    job_id,
                    error: message,
                }
            }
        }
    }

    async fn process(
        &self,
        job_id: &str,
        reporter: &mut ProgressReporter<'_>,
    ) -> WorkerResult<OutputDescriptor> {
        let job = retry_async_when(&self.retry, ApiError::is_retryable, || {
            self.api.fetch_job(job_id)
        })
        .await?;
        reporter.start().await?;

        let workspace = JobWorkspace::create(&self.config.work_dir, job_id)?;
        let ctx = RenderContext {
            encoder: self.encoder.as_ref(),
            store: self.store.as_deref(),
            http: &self.http,
            config: &self.config,
        };
        let output = render_job(&job, &workspace, &ctx, reporter).await?;

        if let Err(e) = workspace.release() {
            warn!(job_id = %job_id, "Failed to remove job workspace: {}", e);
        }

        reporter.complete(output.clone()).await?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_media::{FfmpegCommand, MediaResult};
    use reel_models::JobStatus;
    use reel_queue::ExportJobPayload;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FailingEncoder;

    #[async_trait]
    impl Encoder for FailingEncoder {
        async fn encode(&self, _cmd: &FfmpegCommand) -> MediaResult<()> {
            Err(reel_media::MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Conversion failed!".into()),
                Some(1),
            ))
        }
    }

    fn claimed(job_ref: Option<&str>) -> ClaimedJob {
        let data = match job_ref {
            Some(id) => ExportJobPayload::new(id),
            None => ExportJobPayload::default(),
        };
        ClaimedJob::new("1700000000000-0", data, 0)
    }

    fn job() -> ExportJob {
        serde_json::from_value(serde_json::json!({
            "id": "exp_1",
            "userId": "user_1",
            "name": "Broken",
            "metadata": {"timeline": {"clips": [{"id": "c1", "duration": 2.0}]}}
        }))
        .unwrap()
    }

    fn executor(queue: MockJobSource, api: MockStatusApi, work_dir: &TempDir) -> JobExecutor {
        let config = WorkerConfig {
            work_dir: work_dir.path().to_path_buf(),
            uploads_dir: work_dir.path().join("uploads"),
            ..Default::default()
        };
        JobExecutor::new(Arc::new(queue), Arc::new(api), Arc::new(FailingEncoder), config)
            .with_retry(RetryConfig::new("test").with_base_delay(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let dir = TempDir::new().unwrap();
        let mut queue = MockJobSource::new();
        queue.expect_claim().times(1).returning(|| Ok(None));
        let api = MockStatusApi::new();

        let outcome = executor(queue, api, &dir).run_once().await.unwrap();
        assert_eq!(outcome, Outcome::NoJob);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_missing_job_ref_fails_in_queue_only() {
        let dir = TempDir::new().unwrap();
        let mut queue = MockJobSource::new();
        queue.expect_claim().returning(|| Ok(Some(claimed(None))));
        queue
            .expect_fail()
            .withf(|job, reason| job.id == "1700000000000-0" && reason.contains("no export job reference"))
            .times(1)
            .returning(|_, _| Ok(()));
        queue.expect_complete().never();

        let mut api = MockStatusApi::new();
        api.expect_fetch_job().never();
        api.expect_update_status().never();

        let outcome = executor(queue, api, &dir).run_once().await.unwrap();
        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut queue = MockJobSource::new();
        queue.expect_claim().returning(|| Ok(Some(claimed(Some("exp_404")))));
        queue.expect_fail().times(1).returning(|_, _| Ok(()));

        let mut api = MockStatusApi::new();
        api.expect_fetch_job()
            .withf(|id| id == "exp_404")
            .times(1)
            .returning(|id| Err(ApiError::NotFound(id.to_string())));
        api.expect_update_status()
            .withf(|_, update| update.status == Some(JobStatus::Failed))
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = executor(queue, api, &dir).run_once().await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { ref job_id, .. } if job_id == "exp_404"));
    }

    #[tokio::test]
    async fn test_encoder_failure_reports_once_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut queue = MockJobSource::new();
        queue.expect_claim().returning(|| Ok(Some(claimed(Some("exp_1")))));
        queue
            .expect_fail()
            .withf(|_, reason| reason.contains("FFmpeg"))
            .times(1)
            .returning(|_, _| Ok(()));
        queue.expect_complete().never();

        let mut api = MockStatusApi::new();
        api.expect_fetch_job().returning(|_| Ok(job()));
        api.expect_update_status()
            .withf(|_, update| update.status != Some(JobStatus::Failed))
            .returning(|_, _| Ok(()));
        api.expect_update_status()
            .withf(|_, update| {
                update.status == Some(JobStatus::Failed)
                    && update
                        .error
                        .as_ref()
                        .and_then(|e| e.stack.as_deref())
                        .is_some_and(|s| s.contains("Conversion failed!"))
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = executor(queue, api, &dir).run_once().await.unwrap();
        assert_eq!(outcome.exit_code(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("reel-export-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
