//! Redis Streams export job queue.
//!
//! This crate provides:
//! - Single-entry claims through a consumer group
//! - Completion (ack + delete) and failure with retry/DLQ
//! - Reclaiming entries abandoned by crashed workers

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{ClaimedJob, ExportJobPayload};
pub use queue::{JobQueue, QueueConfig};
