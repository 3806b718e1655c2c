//! The render pipeline for one export job.
//!
//! Stages run strictly in order and exchange files through the job
//! workspace: clips, compositing, watermark, finalize. Every stage failure
//! aborts the job; only media resolution recovers on its own.

use tracing::{info, warn};

use reel_media::{
    apply_watermark, composite, render_clip, Encoder, MediaResolver, WatermarkOverlay,
};
use reel_models::{EncodingConfig, ExportJob, OutputDescriptor};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::finalize::{finalize, output_file_name, ObjectStore, RenderedOutput};
use crate::progress::{Phase, ProgressReporter};
use crate::workspace::JobWorkspace;

/// Collaborators shared by every stage.
pub struct RenderContext<'a> {
    pub encoder: &'a dyn Encoder,
    /// Object storage; exports stay on local disk when `None`
    pub store: Option<&'a dyn ObjectStore>,
    pub http: &'a reqwest::Client,
    pub config: &'a WorkerConfig,
}

impl RenderContext<'_> {
    fn overlay(&self) -> WatermarkOverlay {
        let overlay = WatermarkOverlay::default().with_text(self.config.watermark_text.as_str());
        match &self.config.watermark_font_file {
            Some(font) => overlay.with_font_file(font),
            None => overlay,
        }
    }
}

/// Render `job` into a stored export and describe it.
pub async fn render_job(
    job: &ExportJob,
    workspace: &JobWorkspace,
    ctx: &RenderContext<'_>,
    reporter: &mut ProgressReporter<'_>,
) -> WorkerResult<OutputDescriptor> {
    let clips = &job.timeline().clips;
    if clips.is_empty() {
        return Err(WorkerError::EmptyTimeline(job.id.clone()));
    }

    for clip in clips.iter().filter(|c| c.layer != 0) {
        warn!(
            clip_id = %clip.id,
            layer = clip.layer,
            "Layered compositing is not supported, rendering clip in sequence"
        );
    }

    let settings = &job.settings;
    let encoding = EncodingConfig::for_quality(settings.quality);
    let (width, height) = settings.dimensions();
    info!(
        clips = clips.len(),
        width,
        height,
        fps = settings.frame_rate(),
        crf = encoding.crf,
        "Rendering timeline"
    );

    // Clips
    let total = clips.len() as u32;
    reporter.report(Phase::ProcessingClips, Some((0, total))).await?;

    let mut resolver = MediaResolver::new(
        ctx.config.uploads_dir.clone(),
        workspace.media_dir(),
        ctx.http.clone(),
    );
    let mut intermediates = Vec::with_capacity(clips.len());
    for (index, clip) in clips.iter().enumerate() {
        let media = clip.media_id.as_deref().and_then(|id| job.media(id));
        let source = resolver.resolve(clip, media).await;
        let path = render_clip(
            ctx.encoder,
            clip,
            &source,
            settings,
            &encoding,
            workspace.clip_path(index),
        )
        .await?;
        intermediates.push(path);

        reporter
            .report(Phase::ProcessingClips, Some((index as u32 + 1, total)))
            .await?;
    }

    // Transitions
    reporter.report(Phase::ApplyingTransitions, None).await?;
    let merged = composite(
        ctx.encoder,
        &intermediates,
        clips,
        settings,
        &encoding,
        workspace.merged_path(),
    )
    .await?;

    // Watermark
    reporter.report(Phase::ApplyingWatermark, None).await?;
    let final_path = workspace.output_path(&output_file_name(job));
    let watermark_applied = apply_watermark(
        ctx.encoder,
        &merged.path,
        &job.watermark_settings,
        &ctx.overlay(),
        settings,
        &encoding,
        &final_path,
    )
    .await?;

    // Finalize
    reporter.report(Phase::Finalizing, None).await?;
    let rendered = RenderedOutput {
        duration: merged.duration,
        watermark_applied,
    };
    finalize(&final_path, job, rendered, ctx.store, &ctx.config.uploads_dir).await
}
