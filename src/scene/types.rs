use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stable identity for a scene, independent of its position.
///
/// Indices shift on insert/delete/reorder; ids never do. In-flight
/// generation results are committed against an id, not an index, so a
/// structural change can never apply a result to the wrong scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

/// Lifecycle of one scene's image generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Unstarted,
    InProgress,
    Succeeded,
    Failed(String),
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// A complete generated visual asset. Either absent or whole, never
/// partially written.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Pixel dimensions, known when the asset was decoded on arrival
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Sniff the format from magic bytes, defaulting to PNG
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else {
            Self::Png
        }
    }
}

impl ImageAsset {
    /// Wrap bytes without validating them
    pub fn new(bytes: Vec<u8>) -> Self {
        let format = ImageFormat::sniff(&bytes);
        Self { bytes, format, dimensions: None }
    }

    /// Decode and validate a backend payload. A payload that is not a
    /// decodable image is treated as a failed attempt, never stored.
    pub fn decode(bytes: Vec<u8>) -> std::result::Result<Self, String> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| format!("undecodable image payload: {e}"))?;
        let format = ImageFormat::sniff(&bytes);
        Ok(Self {
            dimensions: Some((decoded.width(), decoded.height())),
            bytes,
            format,
        })
    }
}

/// Output orientation requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    #[default]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
            Self::Square => "1:1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "9:16" => Some(Self::Portrait),
            "16:9" => Some(Self::Landscape),
            "1:1" => Some(Self::Square),
            _ => None,
        }
    }

    /// Orientation constraint embedded into image prompts. The backend has
    /// no structural guarantee of output shape, so the ratio travels in the
    /// prompt text.
    pub fn prompt_constraint(&self) -> &'static str {
        match self {
            Self::Portrait => "Vertical 9:16 portrait composition.",
            Self::Landscape => "Wide 16:9 landscape composition.",
            Self::Square => "Square 1:1 composition.",
        }
    }
}

/// One ordered unit of the story
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: SceneId,
    /// Position in the ordered sequence, 0-based, contiguous
    pub index: usize,
    pub title: String,
    pub summary: String,
    /// Text sent to the image backend; edited independently of `summary`
    pub image_prompt: String,
    /// Intended animation, informational only
    pub motion_prompt: Option<String>,
    pub image: Option<ImageAsset>,
    /// User-uploaded clip used instead of a still at compile time
    pub video_clip: Option<PathBuf>,
    /// Effect id matched from scene text, recomputed on text edits
    pub audio_effect: Option<String>,
    pub generation_state: GenerationState,
    pub retry_count: u32,
    /// Monotonically increasing per-scene token; results from attempts
    /// tagged with an older token are discarded
    pub token: u64,
}

impl Scene {
    pub fn new(id: SceneId, index: usize, descriptor: SceneDescriptor) -> Self {
        Self {
            id,
            index,
            title: descriptor.title,
            summary: descriptor.summary,
            image_prompt: descriptor.image_prompt,
            motion_prompt: descriptor.motion_prompt,
            image: None,
            video_clip: None,
            audio_effect: None,
            generation_state: GenerationState::Unstarted,
            retry_count: 0,
            token: 0,
        }
    }

    /// Whether this scene contributes a segment to a compiled video
    pub fn is_renderable(&self) -> bool {
        self.image.is_some() || self.video_clip.is_some()
    }
}

/// Parsed output of decomposition, before a scene is added to a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescriptor {
    pub title: String,
    pub summary: String,
    pub image_prompt: String,
    pub motion_prompt: Option<String>,
}

/// The user's free-text input plus per-story configuration. Consumed once
/// by decomposition; not retained afterward.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    pub text: String,
    pub scene_count: usize,
    pub aspect_ratio: AspectRatio,
    pub style: Option<String>,
}

impl StoryDraft {
    pub fn new(text: impl Into<String>, scene_count: usize) -> Self {
        Self {
            text: text.into(),
            scene_count,
            aspect_ratio: AspectRatio::default(),
            style: None,
        }
    }
}
