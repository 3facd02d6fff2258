use std::path::PathBuf;

use tracing::debug;

use crate::config::VideoConfig;
use crate::error::{CompileError, Result};
use crate::scene::{ImageAsset, Scene};
use crate::sound::EffectLibrary;

/// Visual source for one compiled segment
#[derive(Debug, Clone)]
pub enum SegmentSource {
    /// Generated still, shown for a fixed duration
    Still { image: ImageAsset },
    /// User-uploaded clip, trimmed to the duration cap, optionally with a
    /// matched effect mixed over its own audio
    Clip {
        path: PathBuf,
        effect_audio: Option<PathBuf>,
    },
}

/// One renderable unit of the output video, in scene order
#[derive(Debug, Clone)]
pub struct Segment {
    pub scene_index: usize,
    pub source: SegmentSource,
    /// Display duration for stills; trim cap for clips
    pub duration: f64,
}

/// Deterministic description of the output video. Building the plan does
/// all the selection and ordering; execution only renders it.
#[derive(Debug, Clone)]
pub struct CompilePlan {
    pub segments: Vec<Segment>,
}

impl CompilePlan {
    /// Build a plan from the store's scenes in index order.
    ///
    /// Scenes with no renderable asset are skipped, not errors; a store
    /// where nothing is renderable fails with
    /// [`CompileError::NoRenderableScenes`]. An uploaded clip takes
    /// precedence over a generated still for the same scene.
    pub fn build(
        scenes: &[Scene],
        library: &EffectLibrary,
        config: &VideoConfig,
    ) -> Result<Self> {
        let mut segments = Vec::new();

        for scene in scenes {
            if let Some(clip) = &scene.video_clip {
                let effect_audio = scene
                    .audio_effect
                    .as_deref()
                    .and_then(|id| library.resolve(id))
                    .cloned();
                segments.push(Segment {
                    scene_index: scene.index,
                    source: SegmentSource::Clip { path: clip.clone(), effect_audio },
                    duration: config.max_clip_duration,
                });
            } else if let Some(image) = &scene.image {
                segments.push(Segment {
                    scene_index: scene.index,
                    source: SegmentSource::Still { image: image.clone() },
                    duration: config.still_duration,
                });
            } else {
                debug!("Scene {} has no renderable asset, skipping", scene.index);
            }
        }

        if segments.is_empty() {
            return Err(CompileError::NoRenderableScenes.into());
        }

        Ok(Self { segments })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectsConfig;
    use crate::error::StorycraftError;
    use crate::scene::{SceneDescriptor, SceneStore};

    fn library() -> EffectLibrary {
        EffectLibrary::from_config(&EffectsConfig::default())
    }

    fn store_with(n: usize) -> SceneStore {
        let mut store = SceneStore::new();
        store.populate(
            (0..n)
                .map(|i| SceneDescriptor {
                    title: format!("scene{i}"),
                    summary: "a quiet room".to_string(),
                    image_prompt: "a quiet room".to_string(),
                    motion_prompt: None,
                })
                .collect(),
        );
        store
    }

    fn give_image(store: &mut SceneStore, index: usize) {
        let ticket = store.begin_generation(index).unwrap();
        store.complete_success(&ticket, ImageAsset::new(vec![0x89, b'P']));
    }

    #[test]
    fn test_plan_skips_empty_scenes_and_keeps_order() {
        let mut store = store_with(3);
        give_image(&mut store, 0);
        store.attach_video_clip(2, "clips/ending.mp4").unwrap();

        let plan = CompilePlan::build(store.scenes(), &library(), &VideoConfig::default()).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.segments[0].scene_index, 0);
        assert!(matches!(plan.segments[0].source, SegmentSource::Still { .. }));
        assert_eq!(plan.segments[1].scene_index, 2);
        assert!(matches!(plan.segments[1].source, SegmentSource::Clip { .. }));
    }

    #[test]
    fn test_plan_fails_when_nothing_is_renderable() {
        let store = store_with(3);
        let result = CompilePlan::build(store.scenes(), &library(), &VideoConfig::default());
        assert!(matches!(
            result,
            Err(StorycraftError::Compile(CompileError::NoRenderableScenes))
        ));
    }

    #[test]
    fn test_durations_follow_configuration() {
        let mut store = store_with(2);
        give_image(&mut store, 0);
        store.attach_video_clip(1, "clips/fishing.mp4").unwrap();

        let config = VideoConfig { still_duration: 2.0, max_clip_duration: 4.0, ..Default::default() };
        let plan = CompilePlan::build(store.scenes(), &library(), &config).unwrap();

        assert_eq!(plan.segments[0].duration, 2.0);
        assert_eq!(plan.segments[1].duration, 4.0);
    }

    #[test]
    fn test_clip_effect_resolved_from_library() {
        let mut store = store_with(2);
        store.edit_summary(0, "the cat is eating fish").unwrap();
        store.attach_video_clip(0, "clips/lunch.mp4").unwrap();
        store.edit_summary(1, "a silent hallway").unwrap();
        store.attach_video_clip(1, "clips/hall.mp4").unwrap();

        let plan = CompilePlan::build(store.scenes(), &library(), &VideoConfig::default()).unwrap();

        match &plan.segments[0].source {
            SegmentSource::Clip { effect_audio, .. } => assert!(effect_audio.is_some()),
            _ => panic!("expected clip segment"),
        }
        match &plan.segments[1].source {
            SegmentSource::Clip { effect_audio, .. } => assert!(effect_audio.is_none()),
            _ => panic!("expected clip segment"),
        }
    }

    #[test]
    fn test_clip_takes_precedence_over_still() {
        let mut store = store_with(1);
        give_image(&mut store, 0);
        store.attach_video_clip(0, "clips/override.mp4").unwrap();

        let plan = CompilePlan::build(store.scenes(), &library(), &VideoConfig::default()).unwrap();
        assert!(matches!(plan.segments[0].source, SegmentSource::Clip { .. }));
    }
}
