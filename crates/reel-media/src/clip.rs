//! Per-clip rendering into normalized intermediates.
//!
//! Every intermediate has the export's frame size, frame rate and pixel
//! format, so the compositor can blend them without further conversion.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use reel_models::{Clip, EncodingConfig, ExportSettings};

use crate::command::{Encoder, FfmpegCommand, FfmpegInput};
use crate::effects::clip_effect_filters;
use crate::error::MediaResult;
use crate::filters::{Filter, FilterChain};
use crate::source::ClipSource;

/// Output duration of a clip: its duration, or one frame if not positive.
pub fn clip_output_duration(clip: &Clip, fps: u32) -> f64 {
    if clip.duration > 0.0 {
        clip.duration
    } else {
        1.0 / fps.max(1) as f64
    }
}

/// Filters that bring any source to the export geometry.
pub fn normalize_filters(width: u32, height: u32, fps: u32) -> Vec<Filter> {
    vec![
        Filter::new("scale")
            .arg("w", width)
            .arg("h", height)
            .arg("force_original_aspect_ratio", "decrease"),
        Filter::new("pad")
            .arg("w", width)
            .arg("h", height)
            .arg("x", "(ow-iw)/2")
            .arg("y", "(oh-ih)/2")
            .arg("color", "black"),
        Filter::new("setsar").value(1),
        Filter::new("fps").value(fps),
        // Short sources hold their last frame; -t bounds the output
        Filter::new("tpad").arg("stop_mode", "clone").arg("stop", -1),
        Filter::new("format").value("yuv420p"),
    ]
}

/// Build the command that renders one clip to `output`.
pub fn build_clip_command(
    clip: &Clip,
    source: &ClipSource,
    settings: &ExportSettings,
    encoding: &EncodingConfig,
    output: impl AsRef<Path>,
) -> FfmpegCommand {
    let (width, height) = settings.dimensions();
    let fps = settings.frame_rate();

    let input = match source {
        ClipSource::File(path) if clip.trim_start > 0.0 => FfmpegInput::file(path).seek(clip.trim_start),
        ClipSource::File(path) => FfmpegInput::file(path),
        ClipSource::Placeholder(placeholder) => placeholder.to_input(width, height, fps),
    };

    let chain = FilterChain::new()
        .filters(clip_effect_filters(clip))
        .filters(normalize_filters(width, height, fps));

    FfmpegCommand::new(output)
        .input(input)
        .video_filter(chain)
        .duration(clip_output_duration(clip, fps))
        .frame_rate(fps)
        .encoding(encoding)
}

/// Render one clip with `encoder`, returning the intermediate path.
pub async fn render_clip(
    encoder: &dyn Encoder,
    clip: &Clip,
    source: &ClipSource,
    settings: &ExportSettings,
    encoding: &EncodingConfig,
    output: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let output = output.as_ref();
    let cmd = build_clip_command(clip, source, settings, encoding, output);

    debug!(clip_id = %clip.id, "Rendering clip to {}", output.display());
    encoder.encode(&cmd).await?;
    info!(
        clip_id = %clip.id,
        placeholder = source.is_placeholder(),
        "Rendered clip ({:.2}s)",
        clip_output_duration(clip, settings.frame_rate())
    );

    Ok(output.to_path_buf())
}
