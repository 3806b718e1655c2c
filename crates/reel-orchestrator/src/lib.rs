//! Client for the export orchestration API.
//!
//! The API owns export job records. The worker fetches job details from it
//! and posts status transitions, progress and the final output back.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiConfig, WORKER_SECRET_HEADER};
pub use error::{ApiError, ApiResult};
