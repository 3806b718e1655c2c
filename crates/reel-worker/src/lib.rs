//! One-shot video export render worker.
//!
//! Each invocation claims at most one export job from the queue, renders its
//! timeline through FFmpeg (clips, transitions, watermark), stores the result
//! and reports progress and the outcome to the orchestration API.

pub mod config;
pub mod error;
pub mod executor;
pub mod finalize;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobSource, Outcome, StatusApi};
pub use finalize::{finalize, output_file_name, ObjectStore, RenderedOutput};
pub use logging::{init_logging, JobLogger};
pub use pipeline::{render_job, RenderContext};
pub use progress::{Phase, ProgressReporter};
pub use retry::{retry_async, RetryConfig};
pub use workspace::JobWorkspace;
