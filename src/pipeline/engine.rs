use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    backend::{ImageGenerator, TextGenerator},
    compile::{CompilePlan, MediaCompiler, VideoArtifact},
    config::Config,
    error::Result,
    export::{ArchiveArtifact, BundleExporter},
    scene::{AspectRatio, SceneDecomposer, SceneStore, StoryDraft},
    sound::EffectLibrary,
    synth::ImageSynthesizer,
};

/// Main engine orchestrating the story-to-media pipeline
///
/// The pipeline is request/response driven; each stage runs to completion
/// or failure before its triggering action is considered done:
/// 1. Decomposition - split the draft into ordered scene records
/// 2. Synthesis - generate an image per scene, concurrently across scenes
/// 3. Assembly - export a bundle or compile a video from the store
pub struct StoryEngine {
    config: Config,
    text_backend: Arc<dyn TextGenerator>,
    image_backend: Arc<dyn ImageGenerator>,
    store: Arc<Mutex<SceneStore>>,
    aspect_ratio: AspectRatio,
}

impl StoryEngine {
    pub fn new(
        config: Config,
        text_backend: Arc<dyn TextGenerator>,
        image_backend: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            config,
            text_backend,
            image_backend,
            store: Arc::new(Mutex::new(SceneStore::new())),
            aspect_ratio: AspectRatio::default(),
        }
    }

    /// Shared handle to the scene store, the single source of truth read
    /// by every pipeline stage and by the UI collaborator
    pub fn store(&self) -> Arc<Mutex<SceneStore>> {
        Arc::clone(&self.store)
    }

    // ==========================================
    // PIPELINE STEP 1: DECOMPOSITION
    // ==========================================

    /// Split the draft into scenes and populate the store.
    ///
    /// On failure no scene is created; the store keeps its previous
    /// contents. Returns the number of scenes produced.
    pub async fn decompose_draft(&mut self, draft: &StoryDraft) -> Result<usize> {
        info!("📖 Step 1: Decomposing story draft...");

        let decomposer = SceneDecomposer::new(self.text_backend.as_ref(), &self.config.story);
        let descriptors = decomposer.decompose(draft).await?;
        let count = descriptors.len();

        self.aspect_ratio = draft.aspect_ratio;
        self.store.lock().await.populate(descriptors);

        info!("   ✅ Draft decomposed into {} scenes", count);
        Ok(count)
    }

    // ==========================================
    // PIPELINE STEP 2: IMAGE SYNTHESIS
    // ==========================================

    /// Generate images for every scene without one, concurrently across
    /// scenes. Per-scene failures land in that scene's state and never
    /// block the rest of the batch.
    pub async fn generate_images(&self) -> Result<()> {
        info!("🎨 Step 2: Generating scene images...");

        let synthesizer = ImageSynthesizer::new(
            Arc::clone(&self.image_backend),
            self.config.generation.clone(),
        );
        synthesizer.generate_all(self.store(), self.aspect_ratio).await?;

        let store = self.store.lock().await;
        let succeeded = store.scenes().iter().filter(|s| s.image.is_some()).count();
        info!("   ✅ Images generated for {}/{} scenes", succeeded, store.len());
        Ok(())
    }

    /// Explicit user-triggered regenerate for one scene. Resets the retry
    /// counter and supersedes any attempt still in flight for that scene.
    pub async fn regenerate_scene(&self, index: usize) -> Result<()> {
        info!("🔁 Regenerating scene {}", index);
        let synthesizer = ImageSynthesizer::new(
            Arc::clone(&self.image_backend),
            self.config.generation.clone(),
        );
        synthesizer
            .generate_for_scene(&self.store, index, self.aspect_ratio)
            .await
    }

    /// Replace a scene's image prompt without generating anything; a
    /// regenerate must be issued explicitly afterwards
    pub async fn override_prompt(&self, index: usize, prompt: impl Into<String>) -> Result<()> {
        self.store.lock().await.override_prompt(index, prompt)
    }

    // ==========================================
    // PIPELINE STEP 3: ASSEMBLY
    // ==========================================

    /// Export prompts and generated images as a ZIP bundle
    pub async fn export_bundle<P: AsRef<Path>>(&self, path: P) -> Result<ArchiveArtifact> {
        info!("📦 Step 3: Exporting story bundle...");

        let store = self.store.lock().await;
        let artifact = BundleExporter::export_to_file(store.scenes(), path)?;

        info!("   ✅ Bundle written with {} entries", artifact.entry_count);
        Ok(artifact)
    }

    /// Compile all renderable scenes into one continuous video
    pub async fn compile_video<P: AsRef<Path>>(&self, path: P) -> Result<VideoArtifact> {
        info!("🎞️  Step 3: Compiling story video...");

        let library = EffectLibrary::from_config(&self.config.effects);
        let plan = {
            let store = self.store.lock().await;
            CompilePlan::build(store.scenes(), &library, &self.config.video)?
        };

        let mut compiler = MediaCompiler::new(self.config.video.clone());
        let result = compiler.compile(&plan, path).await;
        compiler.cleanup()?;
        let artifact = result?;

        info!(
            "   ✅ Video compiled: {} segments, {:.1}s planned",
            artifact.segment_count, artifact.planned_duration
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextOutput;
    use crate::error::{BackendError, CompileError, StorycraftError};
    use crate::scene::GenerationState;
    use async_trait::async_trait;
    use serde_json::json;

    struct ScriptedText;

    #[async_trait]
    impl TextGenerator for ScriptedText {
        async fn generate_text(
            &self,
            _prompt: &str,
            _schema: Option<&serde_json::Value>,
        ) -> std::result::Result<TextOutput, BackendError> {
            Ok(TextOutput::Structured(json!([
                { "title": "Departure", "summary": "The cats leave home." },
                { "title": "The Catch", "summary": "A shark bites the line near the water." }
            ])))
        }
    }

    struct StaticImages;

    #[async_trait]
    impl ImageGenerator for StaticImages {
        async fn generate_image(
            &self,
            _prompt: &str,
            _aspect_ratio: AspectRatio,
        ) -> std::result::Result<Vec<u8>, BackendError> {
            let mut bytes = Vec::new();
            image::RgbImage::new(2, 2)
                .write_to(
                    &mut std::io::Cursor::new(&mut bytes),
                    image::ImageOutputFormat::Png,
                )
                .unwrap();
            Ok(bytes)
        }
    }

    fn engine() -> StoryEngine {
        StoryEngine::new(Config::default(), Arc::new(ScriptedText), Arc::new(StaticImages))
    }

    #[tokio::test]
    async fn test_decompose_then_generate_fills_store() {
        let mut engine = engine();
        let count = engine
            .decompose_draft(&StoryDraft::new("cats go fishing", 5))
            .await
            .unwrap();
        assert_eq!(count, 2);

        engine.generate_images().await.unwrap();

        let store = engine.store();
        let store = store.lock().await;
        for scene in store.scenes() {
            assert_eq!(scene.generation_state, GenerationState::Succeeded);
            assert!(scene.image.is_some());
        }
        // Effect annotation derived from scene text during population
        assert_eq!(store.get(1).unwrap().audio_effect.as_deref(), Some("water"));
    }

    #[tokio::test]
    async fn test_failed_decomposition_leaves_store_untouched() {
        let mut engine = engine();
        engine
            .decompose_draft(&StoryDraft::new("cats go fishing", 5))
            .await
            .unwrap();

        let result = engine.decompose_draft(&StoryDraft::new("  ", 5)).await;
        assert!(result.is_err());

        let store = engine.store();
        assert_eq!(store.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_compile_without_assets_fails_cleanly() {
        let mut engine = engine();
        engine
            .decompose_draft(&StoryDraft::new("cats go fishing", 5))
            .await
            .unwrap();

        let result = engine.compile_video("story.mp4").await;
        assert!(matches!(
            result,
            Err(StorycraftError::Compile(CompileError::NoRenderableScenes))
        ));
        assert!(!std::path::Path::new("story.mp4").exists());
    }

    #[tokio::test]
    async fn test_export_bundle_from_engine() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = dir.path().join("story.zip");

        let mut engine = engine();
        engine
            .decompose_draft(&StoryDraft::new("cats go fishing", 5))
            .await
            .unwrap();
        engine.generate_images().await.unwrap();

        let artifact = engine.export_bundle(&bundle_path).await.unwrap();
        // prompts.txt plus one image per scene
        assert_eq!(artifact.entry_count, 3);
        assert!(bundle_path.exists());
    }
}
