//! Text watermark overlay for plan-restricted exports.
//!
//! # Architecture
//!
//! - `WatermarkOverlay`: builder for the overlay text and font
//! - `build_watermark_filter`: preset geometry converted to a `drawtext` filter
//! - `apply_watermark`: the stage itself (byte copy when disabled)

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use reel_models::{EncodingConfig, ExportSettings, WatermarkPreset, WatermarkSettings, WatermarkStyle};

use crate::command::{Encoder, FfmpegCommand, FfmpegInput};
use crate::error::MediaResult;
use crate::filters::{fmt_num, Filter, FilterChain};
use crate::fs_utils::copy_file;

// =============================================================================
// Constants
// =============================================================================

/// Overlay text when none is configured.
pub const DEFAULT_WATERMARK_TEXT: &str = "Made with Reel";

/// Outline color for the branded preset.
const BRAND_COLOR: &str = "0x7C3AED";

// =============================================================================
// Configuration (Builder Pattern)
// =============================================================================

/// Text and font used for the overlay.
///
/// ```ignore
/// let overlay = WatermarkOverlay::default()
///     .with_text("Exported with Reel")
///     .with_font_file("/usr/share/fonts/Inter.ttf");
/// ```
#[derive(Debug, Clone)]
pub struct WatermarkOverlay {
    pub text: String,
    /// Font file for `drawtext`; FFmpeg's default font when unset
    pub font_file: Option<PathBuf>,
}

impl Default for WatermarkOverlay {
    fn default() -> Self {
        Self {
            text: DEFAULT_WATERMARK_TEXT.to_string(),
            font_file: None,
        }
    }
}

impl WatermarkOverlay {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.text = text;
        }
        self
    }

    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }
}

// =============================================================================
// Filter Construction
// =============================================================================

/// Preset geometry in absolute pixels for a frame size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayGeometry {
    pub x: f64,
    pub y: f64,
    pub font_size: u32,
    pub opacity: f64,
}

impl OverlayGeometry {
    pub fn for_preset(preset: WatermarkPreset, width: u32, height: u32) -> Self {
        let spec = preset.spec();
        Self {
            x: (width as f64 * spec.x_percent / 100.0).round(),
            y: (height as f64 * spec.y_percent / 100.0).round(),
            font_size: ((height as f64 * spec.size_percent / 100.0).round() as u32).max(8),
            opacity: (spec.opacity_percent / 100.0).clamp(0.0, 1.0),
        }
    }
}

/// Build the `drawtext` filter for a preset at the given frame size.
///
/// The anchor point is placed by percentage and the text box is shifted by
/// the same fraction of its own size, so 0% hugs the left/top edge and 100%
/// the right/bottom edge.
pub fn build_watermark_filter(
    preset: WatermarkPreset,
    overlay: &WatermarkOverlay,
    width: u32,
    height: u32,
) -> Filter {
    let spec = preset.spec();
    let geometry = OverlayGeometry::for_preset(preset, width, height);
    let fx = spec.x_percent / 100.0;
    let fy = spec.y_percent / 100.0;

    let mut filter = Filter::new("drawtext");
    if let Some(font) = &overlay.font_file {
        filter = filter.arg("fontfile", font.to_string_lossy());
    }

    let filter = filter
        .arg("text", &overlay.text)
        .arg("fontsize", geometry.font_size)
        .arg("fontcolor", format!("white@{}", fmt_num(geometry.opacity)))
        .arg("x", format!("{}-text_w*{}", fmt_num(geometry.x), fmt_num(fx)))
        .arg("y", format!("{}-text_h*{}", fmt_num(geometry.y), fmt_num(fy)));

    let edge = (geometry.font_size / 12).max(1);
    match spec.style {
        WatermarkStyle::Shadow => filter
            .arg("shadowcolor", "black@0.6")
            .arg("shadowx", edge)
            .arg("shadowy", edge),
        WatermarkStyle::Border => filter
            .arg("borderw", edge)
            .arg("bordercolor", BRAND_COLOR),
        WatermarkStyle::Box => filter
            .arg("box", 1)
            .arg("boxcolor", format!("black@{}", fmt_num((geometry.opacity * 0.6).min(1.0))))
            .arg("boxborderw", (geometry.font_size / 3).max(2)),
    }
}

// =============================================================================
// Stage
// =============================================================================

/// Produce the final file from the merged one.
///
/// Returns whether an overlay was drawn. When the watermark is disabled the
/// merged file is copied unchanged.
pub async fn apply_watermark(
    encoder: &dyn Encoder,
    merged: impl AsRef<Path>,
    watermark: &WatermarkSettings,
    overlay: &WatermarkOverlay,
    settings: &ExportSettings,
    encoding: &EncodingConfig,
    output: impl AsRef<Path>,
) -> MediaResult<bool> {
    let merged = merged.as_ref();
    let output = output.as_ref();

    if !watermark.enabled {
        let bytes = copy_file(merged, output).await?;
        debug!("Watermark disabled, copied {} bytes", bytes);
        return Ok(false);
    }

    let (width, height) = settings.dimensions();
    let filter = build_watermark_filter(watermark.preset, overlay, width, height);

    let cmd = FfmpegCommand::new(output)
        .input(FfmpegInput::file(merged))
        .video_filter(FilterChain::new().filter(filter))
        .frame_rate(settings.frame_rate())
        .encoding(encoding);

    encoder.encode(&cmd).await?;
    info!(preset = %watermark.preset, "Applied watermark");

    Ok(true)
}
