//! Worker error types.

use std::error::Error as _;

use thiserror::Error;

use reel_models::ErrorDescriptor;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue payload has no export job reference")]
    MissingJobRef,

    #[error("Export job {0} has no clips")]
    EmptyTimeline(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("Orchestration API error: {0}")]
    Api(#[from] reel_orchestrator::ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the job was stopped by a shutdown signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Media(reel_media::MediaError::Cancelled))
    }

    /// Error chain, one cause per line, followed by encoder diagnostics.
    pub fn stack(&self) -> String {
        let mut lines = vec![self.to_string()];
        let mut source = self.source();
        while let Some(cause) = source {
            let line = cause.to_string();
            if lines.last() != Some(&line) {
                lines.push(line);
            }
            source = cause.source();
        }

        if let WorkerError::Media(media) = self {
            if let Some(stderr) = media.stderr() {
                lines.push("--- ffmpeg stderr ---".to_string());
                lines.push(stderr.to_string());
            }
        }

        lines.join("\n")
    }

    /// Failure details for the terminal status update.
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor::new(self.to_string(), Some(self.stack()))
    }
}
