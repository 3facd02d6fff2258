//! # Scene Module
//!
//! Scene data model, the ordered scene store, and draft decomposition.

mod decomposer;
mod store;
pub mod types;

pub use decomposer::SceneDecomposer;
pub use store::{GenerationTicket, SceneStore};
pub use types::{
    AspectRatio, GenerationState, ImageAsset, ImageFormat, Scene, SceneDescriptor, SceneId,
    StoryDraft,
};
