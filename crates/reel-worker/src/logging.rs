//! Logging setup and structured job logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::OutputDescriptor;

use crate::error::WorkerError;

/// Initialize tracing: colored output for dev, JSON when `LOG_FORMAT=json`.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `LOG_LEVEL`
/// (default `info`).
pub fn init_logging() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Lifecycle logging for one export job.
///
/// Every event carries `job_id`, `operation` and the queue attempt, so a
/// single export can be followed across retries.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    attempt: u32,
}

impl JobLogger {
    pub fn new(job_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            attempt: 1,
        }
    }

    /// One-based attempt number of the claimed queue entry.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt.max(1);
        self
    }

    pub fn log_start(&self, message_id: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            attempt = self.attempt,
            message_id = %message_id,
            "Export job claimed"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            attempt = self.attempt,
            "{}", message
        );
    }

    /// Failure with its full cause chain.
    pub fn log_failure(&self, error: &WorkerError) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            attempt = self.attempt,
            cancelled = error.is_cancelled(),
            stack = %error.stack(),
            "Export job failed: {}", error
        );
    }

    pub fn log_completion(&self, output: &OutputDescriptor) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            attempt = self.attempt,
            url = %output.url,
            size = output.size,
            duration = output.duration,
            watermark = output.watermark.applied,
            "Export job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Span wrapping everything done for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "export_job",
            job_id = %self.job_id,
            operation = %self.operation,
            attempt = self.attempt
        )
    }
}
