//! Shared data models for the Reel export worker.
//!
//! This crate provides Serde-serializable types for:
//! - Export jobs and their render settings
//! - The timeline (clips, effects, transitions, audio tracks)
//! - Watermark presets
//! - Output descriptors and status updates sent to the orchestration API
//! - Encoding configuration

pub mod encoding;
pub mod job;
pub mod media;
pub mod output;
pub mod status;
pub mod timeline;
pub mod watermark;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{ExportJob, ExportMetadata, ExportSettings, JobStatus, Quality, Resolution};
pub use media::MediaDescriptor;
pub use output::{OutputDescriptor, StorageInfo, StorageProvider, WatermarkInfo};
pub use status::{ErrorDescriptor, ProcessingInfo, StatusUpdate};
pub use timeline::{
    AudioTrack, Clip, ClipTransitions, Effect, EffectType, Parameters, Timeline, Transition,
    TransitionType,
};
pub use watermark::{PresetSpec, WatermarkPreset, WatermarkSettings, WatermarkStyle};
