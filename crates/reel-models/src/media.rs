//! Media descriptors referenced by clips.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source media embedded into the job metadata by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    #[serde(alias = "_id")]
    pub id: String,
    /// Local path, path relative to the uploads directory, or remote URL
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl MediaDescriptor {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Whether the url points at a remote http(s) resource.
    pub fn is_remote(&self) -> bool {
        let url = self.url.trim();
        url.starts_with("http://") || url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(MediaDescriptor::new("a", "https://cdn.example.com/a.mp4").is_remote());
        assert!(MediaDescriptor::new("a", "http://host/a.mp4").is_remote());
        assert!(!MediaDescriptor::new("a", "/uploads/a.mp4").is_remote());
        assert!(!MediaDescriptor::new("a", "videos/a.mp4").is_remote());
    }
}
