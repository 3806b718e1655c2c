//! Transition compositing of rendered clip intermediates.
//!
//! All intermediates go into a single filter graph that is folded left to
//! right: each boundary either concatenates or cross-blends the running
//! output with the next clip. Cross-blends overlap the two segments, so each
//! `xfade` starts at the accumulated output duration minus its own length.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use reel_models::{Clip, EncodingConfig, ExportSettings, Transition, TransitionType};

use crate::clip::clip_output_duration;
use crate::command::{Encoder, FfmpegCommand, FfmpegInput};
use crate::error::{MediaError, MediaResult};
use crate::filters::{fmt_num, Filter, FilterChain, FilterGraph};

/// Final output label of a composite graph.
pub const COMPOSITE_OUTPUT: &str = "vout";

/// How two neighbouring segments are joined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    Concat,
    Blend { transition: &'static str, duration: f64, offset: f64 },
}

/// A compositing graph with its expected output duration.
#[derive(Debug, Clone)]
pub struct CompositePlan {
    pub inputs: Vec<PathBuf>,
    pub graph: FilterGraph,
    pub boundaries: Vec<Boundary>,
    pub duration: f64,
}

/// Result of the compositing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Composited {
    pub path: PathBuf,
    pub duration: f64,
}

/// `xfade` transition name for a timeline transition.
pub fn xfade_name(transition: &Transition) -> Option<&'static str> {
    let direction = transition
        .parameters
        .text("direction")
        .map(|d| d.to_ascii_lowercase());

    let name = match (transition.kind, direction.as_deref()) {
        (TransitionType::Cut, _) => return None,
        (TransitionType::Crossfade, _) => "fade",
        (TransitionType::Slide, Some("right")) => "slideright",
        (TransitionType::Slide, Some("up")) => "slideup",
        (TransitionType::Slide, Some("down")) => "slidedown",
        (TransitionType::Slide, _) => "slideleft",
        (TransitionType::Wipe, Some("right")) => "wiperight",
        (TransitionType::Wipe, Some("up")) => "wipeup",
        (TransitionType::Wipe, Some("down")) => "wipedown",
        (TransitionType::Wipe, _) => "wipeleft",
    };
    Some(name)
}

/// Build the compositing graph for two or more intermediates.
///
/// `clips[i]` is the clip rendered into `inputs[i]`; its incoming transition
/// decides the boundary between segment `i - 1` and segment `i`.
pub fn plan_composite(inputs: &[PathBuf], clips: &[Clip], fps: u32) -> MediaResult<CompositePlan> {
    if inputs.len() < 2 {
        return Err(MediaError::invalid_input(format!(
            "compositing needs at least two inputs, got {}",
            inputs.len()
        )));
    }
    if inputs.len() != clips.len() {
        return Err(MediaError::invalid_input(format!(
            "{} intermediates for {} clips",
            inputs.len(),
            clips.len()
        )));
    }

    let durations: Vec<f64> = clips.iter().map(|c| clip_output_duration(c, fps)).collect();
    let mut graph = FilterGraph::new();

    // Reset timestamps so xfade offsets are relative to each segment
    for i in 0..inputs.len() {
        graph.push(
            FilterChain::new()
                .input(format!("{}:v", i))
                .filter(Filter::new("settb").value("AVTB"))
                .filter(Filter::new("setpts").value("PTS-STARTPTS"))
                .output(format!("s{}", i)),
        );
    }

    let mut boundaries = Vec::with_capacity(inputs.len() - 1);
    let mut previous = "s0".to_string();
    let mut accumulated = durations[0];

    for i in 1..inputs.len() {
        let label = if i == inputs.len() - 1 {
            COMPOSITE_OUTPUT.to_string()
        } else {
            format!("v{}", i)
        };

        let blend = clips[i].transition_in().and_then(|t| {
            let name = xfade_name(t)?;
            let duration = t.duration.min(durations[i - 1]).min(durations[i]);
            (duration > 0.0).then_some((name, duration))
        });

        let (filter, boundary) = match blend {
            Some((name, duration)) => {
                let offset = (accumulated - duration).max(0.0);
                accumulated += durations[i] - duration;
                (
                    Filter::new("xfade")
                        .arg("transition", name)
                        .arg("duration", fmt_num(duration))
                        .arg("offset", fmt_num(offset)),
                    Boundary::Blend { transition: name, duration, offset },
                )
            }
            None => {
                accumulated += durations[i];
                (
                    Filter::new("concat").arg("n", 2).arg("v", 1).arg("a", 0),
                    Boundary::Concat,
                )
            }
        };

        graph.push(
            FilterChain::new()
                .input(&previous)
                .input(format!("s{}", i))
                .filter(filter)
                .output(&label),
        );
        boundaries.push(boundary);
        previous = label;
    }

    Ok(CompositePlan {
        inputs: inputs.to_vec(),
        graph,
        boundaries,
        duration: accumulated,
    })
}

/// Build the single encoder invocation for a plan.
pub fn build_composite_command(
    plan: &CompositePlan,
    settings: &ExportSettings,
    encoding: &EncodingConfig,
    output: impl AsRef<Path>,
) -> FfmpegCommand {
    let cmd = plan
        .inputs
        .iter()
        .fold(FfmpegCommand::new(output), |cmd, path| cmd.input(FfmpegInput::file(path)));

    cmd.filter_complex(plan.graph.clone())
        .map(COMPOSITE_OUTPUT)
        .frame_rate(settings.frame_rate())
        .encoding(encoding)
}

/// Merge rendered intermediates into one stream.
///
/// A single intermediate is returned as is.
pub async fn composite(
    encoder: &dyn Encoder,
    inputs: &[PathBuf],
    clips: &[Clip],
    settings: &ExportSettings,
    encoding: &EncodingConfig,
    output: impl AsRef<Path>,
) -> MediaResult<Composited> {
    let fps = settings.frame_rate();
    match (inputs, clips) {
        ([], _) => Err(MediaError::invalid_input("nothing to composite")),
        ([only], [clip]) => {
            debug!("Single clip, skipping compositing");
            Ok(Composited {
                path: only.clone(),
                duration: clip_output_duration(clip, fps),
            })
        }
        _ => {
            let plan = plan_composite(inputs, clips, fps)?;
            let output = output.as_ref();
            let cmd = build_composite_command(&plan, settings, encoding, output);
            if let Some(graph) = cmd.filter_graph() {
                debug!(filters = graph.filters().count(), "Composite graph: {}", graph);
            }

            encoder.encode(&cmd).await?;

            let blends = plan
                .boundaries
                .iter()
                .filter(|b| matches!(b, Boundary::Blend { .. }))
                .count();
            info!(
                inputs = plan.inputs.len(),
                blends,
                "Composited {:.2}s of video",
                plan.duration
            );

            Ok(Composited {
                path: output.to_path_buf(),
                duration: plan.duration,
            })
        }
    }
}
