use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for Storycraft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Story decomposition settings
    pub story: StoryConfig,

    /// Image generation settings
    pub generation: GenerationConfig,

    /// Video compilation settings
    pub video: VideoConfig,

    /// Sound effect library (effect id -> audio file path)
    pub effects: EffectsConfig,

    /// Backend endpoint settings
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            story: StoryConfig::default(),
            generation: GenerationConfig::default(),
            video: VideoConfig::default(),
            effects: EffectsConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.story.validate()?;
        self.generation.validate()?;
        self.video.validate()?;
        Ok(())
    }
}

/// Story decomposition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryConfig {
    /// Default number of scenes to request from the backend
    pub default_scene_count: usize,

    /// Hard upper bound on scenes per story
    pub max_scene_count: usize,

    /// Invariant style text appended to every scene's image prompt so all
    /// images in one story share consistent subjects and composition
    pub style_prefix: String,

    /// Marker the backend is told to place between scene blocks when
    /// structured output is unavailable
    pub scene_separator: String,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            default_scene_count: 6,
            max_scene_count: 10,
            style_prefix: "Children's animated style, soft colors, consistent recurring \
                           characters across all scenes."
                .to_string(),
            scene_separator: "===SCENE===".to_string(),
        }
    }
}

impl StoryConfig {
    fn validate(&self) -> Result<()> {
        if self.default_scene_count == 0 || self.default_scene_count > self.max_scene_count {
            return Err(ConfigError::InvalidValue {
                key: "story.default_scene_count".to_string(),
                value: self.default_scene_count.to_string(),
            }
            .into());
        }

        if self.scene_separator.trim().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "story.scene_separator".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Image generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Failed attempts allowed per generation request; the scene is marked
    /// failed once its retry count reaches this bound
    pub max_retries: u32,

    /// Backoff intervals in seconds between automatic retries; the last
    /// entry repeats if there are more retries than entries
    pub backoff_seconds: Vec<u64>,

    /// Maximum concurrent backend calls across scenes
    pub max_workers: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_seconds: vec![1, 3],
            max_workers: num_cpus::get().min(4),
        }
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generation.max_workers".to_string(),
                value: self.max_workers.to_string(),
            }
            .into());
        }

        if self.backoff_seconds.is_empty() {
            return Err(ConfigError::MissingKey {
                key: "generation.backoff_seconds".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff_for_retry(&self, retry: u32) -> std::time::Duration {
        let idx = (retry as usize).saturating_sub(1).min(self.backoff_seconds.len() - 1);
        std::time::Duration::from_secs(self.backoff_seconds[idx])
    }
}

/// Video compilation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Output frame rate
    pub fps: u32,

    /// Seconds each still-image scene is displayed
    pub still_duration: f64,

    /// Maximum seconds kept from an uploaded video clip
    pub max_clip_duration: f64,

    /// Video codec for the output file
    pub codec: String,

    /// Audio codec for the output file
    pub audio_codec: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            still_duration: 1.0,
            max_clip_duration: 5.0,
            codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "video.fps".to_string(),
                value: self.fps.to_string(),
            }
            .into());
        }

        if self.still_duration <= 0.0 || self.max_clip_duration <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "video.durations".to_string(),
                value: format!("{}/{}", self.still_duration, self.max_clip_duration),
            }
            .into());
        }

        Ok(())
    }
}

/// Static effect library mapping: effect id -> audio asset path.
/// Read-only at runtime, never discovered dynamically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectsConfig {
    pub library: HashMap<String, String>,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        let mut library = HashMap::new();
        library.insert("eating".to_string(), "assets/sfx/eating.mp3".to_string());
        library.insert("water".to_string(), "assets/sfx/water.mp3".to_string());
        library.insert("footsteps".to_string(), "assets/sfx/footsteps.mp3".to_string());
        library.insert("wind".to_string(), "assets/sfx/wind.mp3".to_string());
        library.insert("birds".to_string(), "assets/sfx/birds.mp3".to_string());
        Self { library }
    }
}

/// Backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Text generation model name
    pub text_model: String,

    /// Image generation model name
    pub image_model: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".to_string(),
            text_model: "gemini-1.5-pro".to_string(),
            image_model: "imagen-3.0-generate-001".to_string(),
            timeout_seconds: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let original_config = Config::default();

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.video.fps, loaded_config.video.fps);
        assert_eq!(
            original_config.generation.max_retries,
            loaded_config.generation.max_retries
        );
        assert_eq!(
            original_config.story.scene_separator,
            loaded_config.story.scene_separator
        );
    }

    #[test]
    fn test_invalid_worker_count() {
        let mut config = Config::default();
        config.generation.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_still_duration() {
        let mut config = Config::default();
        config.video.still_duration = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_schedule_repeats_last_entry() {
        let config = GenerationConfig::default();
        assert_eq!(config.backoff_for_retry(1).as_secs(), 1);
        assert_eq!(config.backoff_for_retry(2).as_secs(), 3);
        assert_eq!(config.backoff_for_retry(5).as_secs(), 3);
    }
}
