//! # Image Synthesis Module
//!
//! Per-scene image generation driver: bounded retries with escalating
//! backoff, stale-result rejection via generation tokens, and a
//! semaphore-capped concurrent batch mode.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::backend::ImageGenerator;
use crate::config::GenerationConfig;
use crate::error::{GenerationError, Result};
use crate::scene::{AspectRatio, ImageAsset, SceneStore};

/// Drives image generation for scenes in a [`SceneStore`].
///
/// Each scene's generation is independent; a failure in one scene never
/// blocks another. All writes to a scene go through the store under its
/// lock, gated by the generation token issued at start, so a manual
/// regenerate always supersedes a still-in-flight attempt.
#[derive(Clone)]
pub struct ImageSynthesizer {
    backend: Arc<dyn ImageGenerator>,
    config: GenerationConfig,
}

impl ImageSynthesizer {
    pub fn new(backend: Arc<dyn ImageGenerator>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    /// Generate images for every scene that has no image yet, with at most
    /// `max_workers` concurrent backend calls. Scene order in the store is
    /// never affected by completion order.
    pub async fn generate_all(
        &self,
        store: Arc<Mutex<SceneStore>>,
        aspect_ratio: AspectRatio,
    ) -> Result<()> {
        let pending: Vec<usize> = {
            let store = store.lock().await;
            store
                .scenes()
                .iter()
                .filter(|s| s.image.is_none())
                .map(|s| s.index)
                .collect()
        };

        if pending.is_empty() {
            info!("No scenes awaiting generation");
            return Ok(());
        }

        info!(
            "Generating images for {} scenes ({} workers)",
            pending.len(),
            self.config.max_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut handles = Vec::with_capacity(pending.len());

        for index in pending {
            let permit_source = Arc::clone(&semaphore);
            let store = Arc::clone(&store);
            let synthesizer = self.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = permit_source.acquire_owned().await else {
                    return;
                };
                if let Err(e) = synthesizer.generate_for_scene(&store, index, aspect_ratio).await {
                    // Surfaced in the scene's own state; the batch goes on
                    warn!("Scene {} generation ended with error: {}", index, e);
                }
            }));
        }

        for handle in handles {
            handle.await.map_err(|e| {
                crate::error::StorycraftError::generic(format!("generation task panicked: {e}"))
            })?;
        }

        Ok(())
    }

    /// Run the generation state machine for one scene.
    ///
    /// Marks the scene in-progress, then attempts the backend call with up
    /// to `max_retries` automatic retries and escalating backoff. Success
    /// replaces the image wholesale; exhausted retries leave the scene in
    /// `Failed(reason)`. A regenerate issued while this is in flight bumps
    /// the token, making this attempt's eventual result a discard.
    pub async fn generate_for_scene(
        &self,
        store: &Arc<Mutex<SceneStore>>,
        index: usize,
        aspect_ratio: AspectRatio,
    ) -> Result<()> {
        let ticket = store.lock().await.begin_generation(index)?;
        debug!("Scene {} generation started (token {})", index, ticket.token);

        loop {
            let outcome = self
                .backend
                .generate_image(&ticket.image_prompt, aspect_ratio)
                .await;

            let reason = match outcome {
                Ok(bytes) if bytes.is_empty() => GenerationError::EmptyPayload.to_string(),
                // Malformed payloads count as failed attempts too
                Ok(bytes) => match ImageAsset::decode(bytes) {
                    Ok(asset) => {
                        let mut store = store.lock().await;
                        if store.complete_success(&ticket, asset) {
                            info!("Scene {} image generated", index);
                            return Ok(());
                        }
                        return Err(GenerationError::Superseded.into());
                    }
                    Err(reason) => reason,
                },
                Err(e) => e.to_string(),
            };

            let retry_count = {
                let mut store = store.lock().await;
                match store.record_attempt_failure(&ticket) {
                    Some(count) => count,
                    None => return Err(GenerationError::Superseded.into()),
                }
            };

            if retry_count < self.config.max_retries {
                let backoff = self.config.backoff_for_retry(retry_count);
                debug!(
                    "Scene {} attempt {} failed ({}); retrying in {:?}",
                    index, retry_count, reason, backoff
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            warn!("Scene {} failed after {} attempts: {}", index, retry_count, reason);
            store.lock().await.complete_failure(&ticket, reason.clone());
            return Err(GenerationError::RetriesExhausted {
                attempts: retry_count,
                reason,
            }
            .into());
        }
    }
}
