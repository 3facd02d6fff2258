use tracing::{debug, warn};

use crate::error::{GenerationError, Result};
use crate::scene::types::{GenerationState, ImageAsset, Scene, SceneDescriptor, SceneId};
use crate::sound::SoundMatcher;

/// Claim on one generation attempt sequence for a scene.
///
/// Issued by [`SceneStore::begin_generation`]; results are only accepted
/// while the scene's current token still matches the ticket's.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub id: SceneId,
    pub token: u64,
    pub image_prompt: String,
}

/// In-memory ordered collection of scenes; the single source of truth for
/// every other pipeline component.
///
/// Indices are contiguous 0..N-1 at all times. Every operation that changes
/// structure re-indexes; every operation that edits scene text recomputes
/// the scene's sound-effect annotation.
#[derive(Debug)]
pub struct SceneStore {
    scenes: Vec<Scene>,
    matcher: SoundMatcher,
    next_id: u64,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::with_matcher(SoundMatcher::default())
    }

    pub fn with_matcher(matcher: SoundMatcher) -> Self {
        Self { scenes: Vec::new(), matcher, next_id: 1 }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn get(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn get_by_id(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    fn get_mut_by_id(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }

    /// Replace the store contents with freshly decomposed scenes
    pub fn populate(&mut self, descriptors: Vec<SceneDescriptor>) {
        self.scenes.clear();
        for descriptor in descriptors {
            let id = self.allocate_id();
            let index = self.scenes.len();
            let mut scene = Scene::new(id, index, descriptor);
            scene.audio_effect = self.match_effect(&scene);
            self.scenes.push(scene);
        }
        debug!("Store populated with {} scenes", self.scenes.len());
    }

    /// Insert a scene at `index`, shifting later scenes down
    pub fn insert(&mut self, index: usize, descriptor: SceneDescriptor) -> SceneId {
        let id = self.allocate_id();
        let index = index.min(self.scenes.len());
        let mut scene = Scene::new(id, index, descriptor);
        scene.audio_effect = self.match_effect(&scene);
        self.scenes.insert(index, scene);
        self.reindex();
        id
    }

    /// Delete the scene at `index`, closing the gap
    pub fn delete(&mut self, index: usize) -> Result<()> {
        if index >= self.scenes.len() {
            return Err(GenerationError::SceneNotFound { index }.into());
        }
        let removed = self.scenes.remove(index);
        debug!("Deleted scene {} ({:?})", index, removed.id);
        self.reindex();
        Ok(())
    }

    /// Move the scene at `from` to position `to`, preserving the relative
    /// order of all other scenes
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.scenes.len() {
            return Err(GenerationError::SceneNotFound { index: from }.into());
        }
        let to = to.min(self.scenes.len() - 1);
        let scene = self.scenes.remove(from);
        self.scenes.insert(to, scene);
        self.reindex();
        Ok(())
    }

    pub fn edit_title(&mut self, index: usize, title: impl Into<String>) -> Result<()> {
        let scene = self.scene_mut(index)?;
        scene.title = title.into();
        Ok(())
    }

    /// Edit the narrative text. Recomputes the effect annotation; never
    /// touches the image prompt or generation state.
    pub fn edit_summary(&mut self, index: usize, summary: impl Into<String>) -> Result<()> {
        let scene = self.scene_mut(index)?;
        scene.summary = summary.into();
        let effect = self.match_effect(&self.scenes[index]);
        self.scenes[index].audio_effect = effect;
        Ok(())
    }

    /// Replace the image prompt without touching generation state. Editing
    /// text alone must never trigger a backend call; a regenerate has to be
    /// issued explicitly afterwards.
    pub fn override_prompt(&mut self, index: usize, prompt: impl Into<String>) -> Result<()> {
        let scene = self.scene_mut(index)?;
        scene.image_prompt = prompt.into();
        let effect = self.match_effect(&self.scenes[index]);
        self.scenes[index].audio_effect = effect;
        Ok(())
    }

    pub fn set_motion_prompt(&mut self, index: usize, motion: Option<String>) -> Result<()> {
        self.scene_mut(index)?.motion_prompt = motion;
        Ok(())
    }

    /// Attach a user-uploaded video clip to be used instead of a still
    pub fn attach_video_clip(
        &mut self,
        index: usize,
        path: impl Into<std::path::PathBuf>,
    ) -> Result<()> {
        self.scene_mut(index)?.video_clip = Some(path.into());
        Ok(())
    }

    /// Start (or restart) generation for the scene at `index`.
    ///
    /// Bumps the scene's token so any still-in-flight attempt from an
    /// earlier request is superseded, resets the retry counter, and moves
    /// the scene to `InProgress`.
    pub fn begin_generation(&mut self, index: usize) -> Result<GenerationTicket> {
        let scene = self.scene_mut(index)?;
        scene.token += 1;
        scene.retry_count = 0;
        scene.generation_state = GenerationState::InProgress;
        Ok(GenerationTicket {
            id: scene.id,
            token: scene.token,
            image_prompt: scene.image_prompt.clone(),
        })
    }

    /// Record a failed attempt. Returns the updated retry count, or `None`
    /// when the ticket is stale (or the scene is gone) and the result must
    /// be discarded.
    pub fn record_attempt_failure(&mut self, ticket: &GenerationTicket) -> Option<u32> {
        let scene = self.get_mut_by_id(ticket.id)?;
        if scene.token != ticket.token {
            warn!("Discarding stale failure for {:?}", ticket.id);
            return None;
        }
        scene.retry_count += 1;
        Some(scene.retry_count)
    }

    /// Commit a successful generation: the image is replaced wholesale.
    /// Stale tickets are silently discarded.
    pub fn complete_success(&mut self, ticket: &GenerationTicket, asset: ImageAsset) -> bool {
        match self.get_mut_by_id(ticket.id) {
            Some(scene) if scene.token == ticket.token => {
                scene.image = Some(asset);
                scene.generation_state = GenerationState::Succeeded;
                true
            }
            _ => {
                warn!("Discarding stale success for {:?}", ticket.id);
                false
            }
        }
    }

    /// Commit a terminal failure after retries are exhausted
    pub fn complete_failure(&mut self, ticket: &GenerationTicket, reason: impl Into<String>) -> bool {
        match self.get_mut_by_id(ticket.id) {
            Some(scene) if scene.token == ticket.token => {
                scene.generation_state = GenerationState::Failed(reason.into());
                true
            }
            _ => {
                warn!("Discarding stale failure for {:?}", ticket.id);
                false
            }
        }
    }

    fn scene_mut(&mut self, index: usize) -> Result<&mut Scene> {
        let len = self.scenes.len();
        self.scenes
            .get_mut(index)
            .ok_or_else(|| {
                debug!("Scene {} out of range (len {})", index, len);
                GenerationError::SceneNotFound { index }.into()
            })
    }

    fn match_effect(&self, scene: &Scene) -> Option<String> {
        let text = format!("{} {}", scene.summary, scene.image_prompt);
        self.matcher.match_effect(&text).map(str::to_string)
    }

    fn allocate_id(&mut self) -> SceneId {
        let id = SceneId(self.next_id);
        self.next_id += 1;
        id
    }

    fn reindex(&mut self) {
        for (index, scene) in self.scenes.iter_mut().enumerate() {
            scene.index = index;
        }
    }
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(title: &str) -> SceneDescriptor {
        SceneDescriptor {
            title: title.to_string(),
            summary: format!("{title} summary"),
            image_prompt: format!("{title} prompt"),
            motion_prompt: None,
        }
    }

    fn store_with(n: usize) -> SceneStore {
        let mut store = SceneStore::new();
        store.populate((0..n).map(|i| descriptor(&format!("scene{i}"))).collect());
        store
    }

    #[test]
    fn test_populate_assigns_contiguous_indices() {
        let store = store_with(4);
        let indices: Vec<usize> = store.scenes().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_delete_reindexes_and_preserves_order() {
        let mut store = store_with(4);
        store.delete(1).unwrap();

        assert_eq!(store.len(), 3);
        let titles: Vec<&str> = store.scenes().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["scene0", "scene2", "scene3"]);
        let indices: Vec<usize> = store.scenes().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_delete_out_of_range_fails() {
        let mut store = store_with(2);
        assert!(store.delete(5).is_err());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_reorder_moves_scene() {
        let mut store = store_with(3);
        store.reorder(0, 2).unwrap();
        let titles: Vec<&str> = store.scenes().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["scene1", "scene2", "scene0"]);
    }

    #[test]
    fn test_begin_generation_resets_retries_and_bumps_token() {
        let mut store = store_with(1);
        let first = store.begin_generation(0).unwrap();
        store.record_attempt_failure(&first).unwrap();
        store.record_attempt_failure(&first).unwrap();
        assert_eq!(store.get(0).unwrap().retry_count, 2);

        let second = store.begin_generation(0).unwrap();
        assert_eq!(store.get(0).unwrap().retry_count, 0);
        assert!(second.token > first.token);
        assert_eq!(store.get(0).unwrap().generation_state, GenerationState::InProgress);
    }

    #[test]
    fn test_stale_ticket_results_discarded() {
        let mut store = store_with(1);
        let old = store.begin_generation(0).unwrap();
        // A regenerate supersedes the first attempt
        let new = store.begin_generation(0).unwrap();

        assert!(!store.complete_success(&old, ImageAsset::new(vec![1, 2, 3])));
        assert!(store.get(0).unwrap().image.is_none());
        assert!(store.record_attempt_failure(&old).is_none());

        assert!(store.complete_success(&new, ImageAsset::new(vec![4, 5])));
        assert_eq!(store.get(0).unwrap().generation_state, GenerationState::Succeeded);
    }

    #[test]
    fn test_regenerate_does_not_touch_other_scenes() {
        let mut store = store_with(3);
        let ticket = store.begin_generation(1).unwrap();
        store.complete_success(&ticket, ImageAsset::new(vec![9]));

        for index in [0, 2] {
            let scene = store.get(index).unwrap();
            assert_eq!(scene.generation_state, GenerationState::Unstarted);
            assert!(scene.image.is_none());
            assert_eq!(scene.retry_count, 0);
        }
    }

    #[test]
    fn test_ticket_survives_reorder() {
        let mut store = store_with(3);
        let ticket = store.begin_generation(0).unwrap();
        store.reorder(0, 2).unwrap();

        assert!(store.complete_success(&ticket, ImageAsset::new(vec![7])));
        // The scene moved to index 2 but the result followed its id
        assert!(store.get(2).unwrap().image.is_some());
        assert!(store.get(0).unwrap().image.is_none());
    }

    #[test]
    fn test_ticket_for_deleted_scene_discarded() {
        let mut store = store_with(2);
        let ticket = store.begin_generation(0).unwrap();
        store.delete(0).unwrap();

        assert!(!store.complete_success(&ticket, ImageAsset::new(vec![1])));
        assert!(store.get(0).unwrap().image.is_none());
    }

    #[test]
    fn test_override_prompt_leaves_generation_state_alone() {
        let mut store = store_with(1);
        store.override_prompt(0, "a shark eating lunch").unwrap();

        let scene = store.get(0).unwrap();
        assert_eq!(scene.generation_state, GenerationState::Unstarted);
        assert_eq!(scene.image_prompt, "a shark eating lunch");
        // Effect annotation recomputed from the new text
        assert_eq!(scene.audio_effect.as_deref(), Some("eating"));
    }

    #[test]
    fn test_edit_summary_recomputes_effect() {
        let mut store = store_with(1);
        assert_eq!(store.get(0).unwrap().audio_effect, None);

        store.edit_summary(0, "splashing in the water").unwrap();
        assert_eq!(store.get(0).unwrap().audio_effect.as_deref(), Some("water"));
    }
}
