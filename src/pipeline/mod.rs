//! # Pipeline Module
//!
//! The story engine orchestrating decomposition, image generation, bundle
//! export and video compilation.

mod engine;

pub use engine::StoryEngine;
