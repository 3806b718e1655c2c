#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and render stages for timeline exports.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A typed filter-graph builder serialized only at invocation time
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and optional timeouts via tokio
//! - Media resolution with deterministic placeholder fallback
//! - The clip, transition and watermark render stages

pub mod clip;
pub mod command;
pub mod download;
pub mod effects;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod placeholder;
pub mod progress;
pub mod source;
pub mod transitions;
pub mod watermark;

pub use clip::{build_clip_command, render_clip};
pub use command::{check_ffmpeg, Encoder, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{Filter, FilterChain, FilterGraph};
pub use placeholder::{Placeholder, PlaceholderPattern};
pub use progress::FfmpegProgress;
pub use source::{ClipSource, MediaResolver};
pub use transitions::{build_composite_command, composite, plan_composite, CompositePlan, Composited};
pub use watermark::{apply_watermark, build_watermark_filter, WatermarkOverlay, DEFAULT_WATERMARK_TEXT};
