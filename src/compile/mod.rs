//! # Media Compilation Module
//!
//! Turns per-scene visual and audio assets into one continuous video.
//! Plan construction is pure and deterministic; rendering shells out to
//! FFmpeg with fixed encoding parameters.

mod ffmpeg;
mod plan;

pub use ffmpeg::{MediaCompiler, VideoArtifact};
pub use plan::{CompilePlan, Segment, SegmentSource};
