//! Video encoding configuration.

use crate::job::Quality;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor), used for medium quality
pub const DEFAULT_CRF: u8 = 23;
/// Default pixel format (widest player compatibility)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Output encoder settings shared by every render stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    /// Constant Rate Factor, 0-51, lower is better
    pub crf: u8,
    pub pixel_format: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

impl EncodingConfig {
    pub fn for_quality(quality: Quality) -> Self {
        Self::default().with_crf(quality.crf())
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Output options for FFmpeg.
    ///
    /// Audio is always dropped: intermediates and the final export carry a
    /// single video stream.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-an".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}
