use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::{TextGenerator, TextOutput};
use crate::config::StoryConfig;
use crate::error::{DecompositionError, Result};
use crate::scene::types::{SceneDescriptor, StoryDraft};

/// Splits a story draft into an ordered list of scene descriptors via a
/// text generation backend.
///
/// Stateless; a decomposition either yields at least one scene or fails
/// without creating any partial state. The requested scene count is a
/// target, not a guarantee: short backend output yields fewer scenes.
pub struct SceneDecomposer<'a> {
    backend: &'a dyn TextGenerator,
    config: &'a StoryConfig,
}

/// Structured scene block as requested from the backend
#[derive(Debug, Deserialize)]
struct SceneBlock {
    title: String,
    summary: String,
    #[serde(default)]
    image_prompt: Option<String>,
    #[serde(default)]
    motion_prompt: Option<String>,
}

impl<'a> SceneDecomposer<'a> {
    pub fn new(backend: &'a dyn TextGenerator, config: &'a StoryConfig) -> Self {
        Self { backend, config }
    }

    /// Decompose a draft into 1..=target scenes.
    ///
    /// Fails with [`DecompositionError::EmptyDraft`] before any backend
    /// call when the draft is blank, and with
    /// [`DecompositionError::NoScenes`] when nothing parseable comes back.
    pub async fn decompose(&self, draft: &StoryDraft) -> Result<Vec<SceneDescriptor>> {
        if draft.text.trim().is_empty() {
            return Err(DecompositionError::EmptyDraft.into());
        }

        let target = draft.scene_count.clamp(1, self.config.max_scene_count);
        let prompt = self.build_prompt(draft, target);
        let schema = Self::response_schema();

        info!("Decomposing draft into up to {} scenes", target);
        let output = self.backend.generate_text(&prompt, Some(&schema)).await?;

        let mut descriptors = match output {
            TextOutput::Structured(value) => self.parse_structured(value),
            TextOutput::Raw(text) => self.parse_raw(&text),
        };

        if descriptors.is_empty() {
            return Err(DecompositionError::NoScenes.into());
        }

        descriptors.truncate(target);
        self.apply_style(&mut descriptors, draft);

        info!("Decomposed draft into {} scenes", descriptors.len());
        Ok(descriptors)
    }

    fn build_prompt(&self, draft: &StoryDraft, target: usize) -> String {
        let style = draft.style.as_deref().unwrap_or(&self.config.style_prefix);
        format!(
            "You are helping create visual scenes for an animated video.\n\
             Break this draft story into exactly {target} discrete, non-overlapping scenes.\n\
             For each scene provide: a short title, a one-paragraph summary, a detailed \
             visual description suitable as an image generation prompt, and an optional \
             motion description for animation.\n\
             Keep characters and visual style consistent across all scenes: {style}\n\
             If you cannot answer as JSON, separate scene blocks with the marker \
             {separator} on its own line.\n\n\
             Story draft:\n{draft}",
            target = target,
            style = style,
            separator = self.config.scene_separator,
            draft = draft.text,
        )
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "summary": { "type": "string" },
                    "image_prompt": { "type": "string" },
                    "motion_prompt": { "type": "string" }
                },
                "required": ["title", "summary"]
            }
        })
    }

    /// Schema-validated path: trust the structure, drop only blocks that
    /// fail to deserialize or are blank
    fn parse_structured(&self, value: serde_json::Value) -> Vec<SceneDescriptor> {
        // Some backends wrap the array in an envelope object
        let value = match value {
            serde_json::Value::Object(mut map) => map
                .remove("scenes")
                .unwrap_or(serde_json::Value::Object(map)),
            other => other,
        };

        let blocks: Vec<SceneBlock> = match serde_json::from_value(value) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("Structured response did not match schema: {e}");
                return Vec::new();
            }
        };

        blocks
            .into_iter()
            .filter(|b| !b.title.trim().is_empty() && !b.summary.trim().is_empty())
            .map(|b| SceneDescriptor {
                image_prompt: b.image_prompt.unwrap_or_else(|| b.summary.clone()),
                title: b.title.trim().to_string(),
                summary: b.summary.trim().to_string(),
                motion_prompt: b.motion_prompt.filter(|m| !m.trim().is_empty()),
            })
            .collect()
    }

    /// Free-text fallback: split on the scene separator (or blank lines)
    /// and degrade gracefully to however many blocks actually parse
    fn parse_raw(&self, text: &str) -> Vec<SceneDescriptor> {
        let separator = &self.config.scene_separator;
        let blocks: Vec<&str> = if text.contains(separator.as_str()) {
            text.split(separator.as_str()).collect()
        } else {
            text.split("\n\n").collect()
        };

        debug!("Raw fallback parsing {} candidate blocks", blocks.len());

        blocks.iter().filter_map(|block| Self::parse_block(block)).collect()
    }

    /// One free-text block: first non-empty line is the title (numbering
    /// stripped), the rest is the summary, with optional labeled prompt
    /// lines honored when present
    fn parse_block(block: &str) -> Option<SceneDescriptor> {
        let mut title = None;
        let mut summary_lines = Vec::new();
        let mut image_prompt = None;
        let mut motion_prompt = None;

        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = strip_label(line, &["visual:", "image:", "image prompt:"]) {
                image_prompt = Some(rest.to_string());
            } else if let Some(rest) = strip_label(line, &["motion:", "animation:"]) {
                motion_prompt = Some(rest.to_string());
            } else if title.is_none() {
                title = Some(strip_numbering(line).to_string());
            } else {
                summary_lines.push(line);
            }
        }

        let title = title.filter(|t| !t.is_empty())?;
        let summary = if summary_lines.is_empty() {
            image_prompt.clone().unwrap_or_else(|| title.clone())
        } else {
            summary_lines.join(" ")
        };

        Some(SceneDescriptor {
            image_prompt: image_prompt.unwrap_or_else(|| summary.clone()),
            title,
            summary,
            motion_prompt,
        })
    }

    /// Append the invariant style text and orientation constraint to every
    /// scene's image prompt so all images in one story share consistent
    /// subjects and shape
    fn apply_style(&self, descriptors: &mut [SceneDescriptor], draft: &StoryDraft) {
        let style = draft.style.as_deref().unwrap_or(&self.config.style_prefix);
        for descriptor in descriptors {
            descriptor.image_prompt = format!(
                "{} {} {}",
                descriptor.image_prompt,
                style,
                draft.aspect_ratio.prompt_constraint()
            );
        }
    }
}

/// Strip a case-insensitive label prefix like "Visual:" from a line
fn strip_label<'t>(line: &'t str, labels: &[&str]) -> Option<&'t str> {
    let lower = line.to_lowercase();
    for label in labels {
        if lower.starts_with(label) {
            return Some(line[label.len()..].trim());
        }
    }
    None
}

/// Strip leading scene numbering like "1.", "Scene 3:", "2)"
fn strip_numbering(line: &str) -> &str {
    let trimmed = line.trim_start();
    let rest = trimmed
        .strip_prefix("Scene")
        .map(str::trim_start)
        .unwrap_or(trimmed);
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    rest.trim_start_matches(['.', ')', ':', '-']).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextOutput;
    use crate::error::{BackendError, StorycraftError};
    use async_trait::async_trait;

    struct MockBackend {
        output: TextOutput,
    }

    #[async_trait]
    impl TextGenerator for MockBackend {
        async fn generate_text(
            &self,
            _prompt: &str,
            _schema: Option<&serde_json::Value>,
        ) -> std::result::Result<TextOutput, BackendError> {
            Ok(self.output.clone())
        }
    }

    fn draft(k: usize) -> StoryDraft {
        StoryDraft::new("a cat and her kitten fishing and they catch a shark", k)
    }

    #[tokio::test]
    async fn test_empty_draft_fails_before_backend_call() {
        struct PanicBackend;

        #[async_trait]
        impl TextGenerator for PanicBackend {
            async fn generate_text(
                &self,
                _prompt: &str,
                _schema: Option<&serde_json::Value>,
            ) -> std::result::Result<TextOutput, BackendError> {
                panic!("backend must not be called for an empty draft");
            }
        }

        let config = StoryConfig::default();
        let decomposer = SceneDecomposer::new(&PanicBackend, &config);
        let result = decomposer.decompose(&StoryDraft::new("   \n ", 5)).await;

        assert!(matches!(
            result,
            Err(StorycraftError::Decomposition(DecompositionError::EmptyDraft))
        ));
    }

    #[tokio::test]
    async fn test_structured_output_parsed_and_styled() {
        let backend = MockBackend {
            output: TextOutput::Structured(json!([
                {
                    "title": "The Riverbank",
                    "summary": "Cat and kitten arrive at the river.",
                    "image_prompt": "two cats walking to a river",
                    "motion_prompt": "slow pan left"
                },
                {
                    "title": "The Catch",
                    "summary": "A shark takes the bait."
                }
            ])),
        };

        let config = StoryConfig::default();
        let decomposer = SceneDecomposer::new(&backend, &config);
        let scenes = decomposer.decompose(&draft(5)).await.unwrap();

        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].title, "The Riverbank");
        assert_eq!(scenes[0].motion_prompt.as_deref(), Some("slow pan left"));
        // Style prefix and orientation land on every image prompt
        for scene in &scenes {
            assert!(scene.image_prompt.contains(&config.style_prefix));
            assert!(scene.image_prompt.contains("16:9"));
        }
        // A scene with no explicit prompt falls back to its summary
        assert!(scenes[1].image_prompt.starts_with("A shark takes the bait."));
    }

    #[tokio::test]
    async fn test_enveloped_structured_output_accepted() {
        let backend = MockBackend {
            output: TextOutput::Structured(json!({
                "scenes": [
                    { "title": "Departure", "summary": "The cats leave home." }
                ]
            })),
        };

        let config = StoryConfig::default();
        let decomposer = SceneDecomposer::new(&backend, &config);
        let scenes = decomposer.decompose(&draft(5)).await.unwrap();

        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].title, "Departure");
    }

    #[tokio::test]
    async fn test_raw_fallback_splits_on_separator() {
        let config = StoryConfig::default();
        let raw = format!(
            "Scene 1: Setting Off\nThe cats pack their fishing rods.\n{sep}\n\
             Scene 2: On The Water\nVisual: a small wooden boat on a calm lake\n\
             The kitten watches the bobber.",
            sep = config.scene_separator
        );
        let backend = MockBackend { output: TextOutput::Raw(raw) };

        let decomposer = SceneDecomposer::new(&backend, &config);
        let scenes = decomposer.decompose(&draft(5)).await.unwrap();

        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].title, "Setting Off");
        assert_eq!(scenes[1].title, "On The Water");
        assert!(scenes[1].image_prompt.starts_with("a small wooden boat"));
    }

    #[tokio::test]
    async fn test_result_truncated_to_target_count() {
        let blocks: Vec<serde_json::Value> = (0..8)
            .map(|i| json!({ "title": format!("S{i}"), "summary": format!("summary {i}") }))
            .collect();
        let backend = MockBackend { output: TextOutput::Structured(json!(blocks)) };

        let config = StoryConfig::default();
        let decomposer = SceneDecomposer::new(&backend, &config);
        let scenes = decomposer.decompose(&draft(3)).await.unwrap();

        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0].title, "S0");
    }

    #[tokio::test]
    async fn test_zero_parseable_scenes_fails() {
        let backend = MockBackend { output: TextOutput::Raw("   \n\n   ".to_string()) };
        let config = StoryConfig::default();
        let decomposer = SceneDecomposer::new(&backend, &config);

        let result = decomposer.decompose(&draft(5)).await;
        assert!(matches!(
            result,
            Err(StorycraftError::Decomposition(DecompositionError::NoScenes))
        ));
    }

    #[test]
    fn test_numbering_stripped_from_titles() {
        assert_eq!(strip_numbering("1. The Riverbank"), "The Riverbank");
        assert_eq!(strip_numbering("Scene 2: The Catch"), "The Catch");
        assert_eq!(strip_numbering("3) Finale"), "Finale");
        assert_eq!(strip_numbering("Plain Title"), "Plain Title");
    }
}
