//! # Storycraft
//!
//! Turn a short story draft into a sequence of illustrated scenes, then
//! assemble them into a downloadable bundle or a compiled video.
//!
//! The pipeline decomposes a draft into ordered scene records via a text
//! generation backend, fills each scene with a generated image (with
//! bounded retries and manual regeneration), annotates scenes with matched
//! sound effects, and finally concatenates the per-scene assets into one
//! continuous output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storycraft::{
//!     backend::GeminiClient,
//!     config::Config,
//!     pipeline::StoryEngine,
//!     scene::StoryDraft,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let client = Arc::new(GeminiClient::from_config(&config.backend)?);
//!
//! let mut engine = StoryEngine::new(config, client.clone(), client);
//! engine
//!     .decompose_draft(&StoryDraft::new(
//!         "a cat and her kitten fishing and they catch a shark",
//!         6,
//!     ))
//!     .await?;
//! engine.generate_images().await?;
//! engine.export_bundle("story.zip").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`scene`] - Scene data model, store and draft decomposition
//! - [`synth`] - Per-scene image generation with retry and cancellation
//! - [`sound`] - Keyword-based effect matching and the effect library
//! - [`compile`] - Video compilation from per-scene assets
//! - [`export`] - ZIP bundle export
//! - [`pipeline`] - The orchestrating engine
//! - [`backend`] - Generative backend traits and the Gemini client
//!
//! ## Custom Backends
//!
//! Any backend can drive the pipeline by implementing the
//! [`TextGenerator`](backend::TextGenerator) and
//! [`ImageGenerator`](backend::ImageGenerator) traits.

pub mod backend;
pub mod compile;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod scene;
pub mod sound;
pub mod synth;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{Result, StorycraftError},
    pipeline::StoryEngine,
    scene::{Scene, SceneStore, StoryDraft},
};
