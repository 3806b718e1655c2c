//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue entry payload: a reference to an export job held by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_job_id: Option<String>,
}

impl ExportJobPayload {
    pub fn new(export_job_id: impl Into<String>) -> Self {
        Self {
            export_job_id: Some(export_job_id.into()),
        }
    }

    /// Parse a raw payload. Anything unreadable yields a payload without a
    /// job reference, which the worker rejects.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// The job reference, if present and non-blank.
    pub fn job_ref(&self) -> Option<&str> {
        self.export_job_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// An entry claimed by this worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    /// Stream entry ID
    pub id: String,
    pub data: ExportJobPayload,
    /// Previous failed attempts of this payload
    pub attempt: u32,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimedJob {
    pub fn new(id: impl Into<String>, data: ExportJobPayload, attempt: u32) -> Self {
        Self {
            id: id.into(),
            data,
            attempt,
            claimed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        let payload = ExportJobPayload::parse(r#"{"exportJobId":"exp_123"}"#);
        assert_eq!(payload.job_ref(), Some("exp_123"));
    }

    #[test]
    fn test_missing_or_blank_reference() {
        assert_eq!(ExportJobPayload::parse("{}").job_ref(), None);
        assert_eq!(ExportJobPayload::parse(r#"{"exportJobId":"  "}"#).job_ref(), None);
        assert_eq!(ExportJobPayload::parse("not json").job_ref(), None);
    }

    #[test]
    fn test_serialize_camel_case() {
        let json = serde_json::to_string(&ExportJobPayload::new("exp_1")).unwrap();
        assert_eq!(json, r#"{"exportJobId":"exp_1"}"#);
    }
}
