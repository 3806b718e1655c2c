//! Status updates posted to the orchestration API.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::output::OutputDescriptor;

/// Body of `POST /export/jobs/{id}/status`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

/// What the pipeline is currently doing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInfo {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

/// Failure details shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    /// Transition to `processing` at the given progress.
    pub fn processing(progress: u8, info: ProcessingInfo) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            processing: Some(info),
            ..Default::default()
        }
    }

    /// Progress-only update.
    pub fn progress(progress: u8, info: ProcessingInfo) -> Self {
        Self {
            progress: Some(progress),
            processing: Some(info),
            ..Default::default()
        }
    }

    /// Terminal success.
    pub fn completed(output: OutputDescriptor) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            output: Some(output),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Terminal failure. Progress is left at its last reported value.
    pub fn failed(error: ErrorDescriptor) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            failed_at: Some(error.timestamp),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Whether this update moves the job into a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }
}

impl ProcessingInfo {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            current: None,
            total: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_counts(mut self, current: u32, total: u32) -> Self {
        self.current = Some(current);
        self.total = Some(total);
        self
    }
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            message: message.into(),
            stack,
            timestamp: Utc::now(),
        }
    }
}
