//! Export job model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::media::MediaDescriptor;
use crate::output::OutputDescriptor;
use crate::timeline::Timeline;
use crate::watermark::WatermarkSettings;

/// Fallback frame size for unknown or incomplete resolution keys (portrait HD).
pub const DEFAULT_DIMENSIONS: (u32, u32) = (1080, 1920);
/// Default output frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// An export job as returned by the orchestration API.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub settings: ExportSettings,
    #[serde(default)]
    pub watermark_settings: WatermarkSettings,
    #[serde(default)]
    pub metadata: ExportMetadata,
    #[serde(default)]
    pub status: JobStatus,
    /// Last reported completion percentage, 0-100
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputDescriptor>,
}

impl ExportJob {
    /// Look up a media descriptor by id.
    pub fn media(&self, media_id: &str) -> Option<&MediaDescriptor> {
        self.metadata.media_files.iter().find(|m| m.id == media_id)
    }

    /// The timeline to render.
    pub fn timeline(&self) -> &Timeline {
        &self.metadata.timeline
    }
}

/// Timeline and resolved media for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    #[serde(default)]
    pub timeline: Timeline,
    #[serde(default)]
    pub media_files: Vec<MediaDescriptor>,
}

/// Render settings chosen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub quality: Quality,
    /// Only read when `resolution` is `custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_height: Option<u32>,
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            quality: Quality::default(),
            custom_width: None,
            custom_height: None,
        }
    }
}

impl ExportSettings {
    /// Output frame size in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match (self.resolution, self.custom_width, self.custom_height) {
            (Resolution::Custom, Some(w), Some(h)) if w > 0 && h > 0 => (even(w), even(h)),
            (resolution, _, _) => resolution.dimensions(),
        }
    }

    /// Output frame rate, never zero.
    pub fn frame_rate(&self) -> u32 {
        if self.frame_rate == 0 {
            DEFAULT_FRAME_RATE
        } else {
            self.frame_rate
        }
    }
}

/// H.264 with 4:2:0 chroma needs even dimensions.
fn even(v: u32) -> u32 {
    v.max(2) & !1
}

/// Output aspect/resolution key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum Resolution {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "4K")]
    Uhd4k,
    #[serde(rename = "custom")]
    Custom,
    #[serde(other)]
    Unknown,
}

impl Resolution {
    /// Static aspect -> WxH table.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Portrait => (1080, 1920),
            Resolution::Landscape => (1920, 1080),
            Resolution::Square => (1080, 1080),
            Resolution::Hd720 => (1280, 720),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Uhd4k => (3840, 2160),
            Resolution::Custom | Resolution::Unknown => DEFAULT_DIMENSIONS,
        }
    }
}

/// Export quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    High,
    #[default]
    #[serde(other)]
    Medium,
}

impl Quality {
    /// CRF used for this quality level.
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Low => 28,
            Quality::Medium => 23,
            Quality::High => 18,
        }
    }
}

/// Export job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued waiting for a worker
    #[default]
    Queued,
    /// Job is actively being rendered
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Job was cancelled by the user
    Cancelled,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TransitionType;
    use crate::watermark::WatermarkPreset;
    use serde_json::json;

    #[test]
    fn test_resolution_table() {
        let settings: ExportSettings = serde_json::from_value(json!({"resolution": "16:9"})).unwrap();
        assert_eq!(settings.dimensions(), (1920, 1080));

        let settings: ExportSettings = serde_json::from_value(json!({"resolution": "4K"})).unwrap();
        assert_eq!(settings.dimensions(), (3840, 2160));
    }

    #[test]
    fn test_unknown_resolution_defaults_to_portrait() {
        let settings: ExportSettings =
            serde_json::from_value(json!({"resolution": "21:9"})).unwrap();
        assert_eq!(settings.resolution, Resolution::Unknown);
        assert_eq!(settings.dimensions(), (1080, 1920));
    }

    #[test]
    fn test_custom_resolution() {
        let settings: ExportSettings = serde_json::from_value(
            json!({"resolution": "custom", "customWidth": 1001, "customHeight": 500}),
        )
        .unwrap();
        assert_eq!(settings.dimensions(), (1000, 500));

        let settings: ExportSettings =
            serde_json::from_value(json!({"resolution": "custom"})).unwrap();
        assert_eq!(settings.dimensions(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_settings_defaults() {
        let settings: ExportSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.frame_rate(), 30);
        assert_eq!(settings.quality, Quality::Medium);

        let settings: ExportSettings =
            serde_json::from_value(json!({"quality": "ultra", "frameRate": 0})).unwrap();
        assert_eq!(settings.quality, Quality::Medium);
        assert_eq!(settings.frame_rate(), 30);
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_export_job_deserialize() {
        let job: ExportJob = serde_json::from_value(json!({
            "_id": "job-1",
            "userId": "user-1",
            "name": "My video",
            "settings": {"resolution": "1:1", "frameRate": 24, "quality": "high"},
            "watermarkSettings": {"enabled": true, "preset": "corner"},
            "metadata": {
                "timeline": {"clips": [], "duration": 0},
                "mediaFiles": [{"id": "m1", "url": "/uploads/a.mp4"}]
            },
            "status": "queued",
            "progress": 0
        }))
        .unwrap();

        assert_eq!(job.id, "job-1");
        assert_eq!(job.settings.frame_rate(), 24);
        assert!(job.media("m1").is_some());
        assert!(job.media("m2").is_none());
    }

    #[test]
    fn test_unknown_enum_values_fall_back() {
        let job: ExportJob = serde_json::from_value(json!({
            "id": "job-2",
            "userId": "user-1",
            "settings": {"quality": "ultra"},
            "watermarkSettings": {"enabled": true, "preset": "gold"},
            "metadata": {
                "timeline": {
                    "clips": [{
                        "id": "c1",
                        "startTime": 0,
                        "duration": 2,
                        "transitions": {"in": {"type": "spin", "duration": 0.5}}
                    }]
                }
            }
        }))
        .unwrap();

        assert_eq!(job.settings.quality, Quality::Medium);
        assert_eq!(job.watermark_settings.preset, WatermarkPreset::Minimal);
        let transition = job.timeline().clips[0].transition_in().unwrap();
        assert_eq!(transition.kind, TransitionType::Cut);
    }

    #[test]
    fn test_fractional_progress_is_accepted() {
        let job: ExportJob = serde_json::from_value(json!({
            "id": "job-3",
            "userId": "user-1",
            "status": "processing",
            "progress": 33.33
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Processing);
        assert!((job.progress - 33.33).abs() < f64::EPSILON);
    }
}
