use thiserror::Error;

/// Main error type for the Storycraft library
#[derive(Error, Debug)]
pub enum StorycraftError {
    #[error("Decomposition error: {0}")]
    Decomposition(#[from] DecompositionError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors from splitting a draft into scenes
#[derive(Error, Debug)]
pub enum DecompositionError {
    #[error("Story draft is empty")]
    EmptyDraft,

    #[error("Backend returned no parseable scenes")]
    NoScenes,

    #[error("Invalid decomposition parameters: {details}")]
    InvalidParameters { details: String },
}

/// Per-scene image generation errors
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Scene {index} not found in store")]
    SceneNotFound { index: usize },

    #[error("Generation attempt superseded by a newer request")]
    Superseded,

    #[error("Retries exhausted after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    #[error("Backend returned an empty image payload")]
    EmptyPayload,
}

/// Video compilation errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("No scene has a renderable asset")]
    NoRenderableScenes,

    #[error("Segment rendering failed: {reason}")]
    SegmentFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("FFmpeg not found on this system")]
    FfmpegMissing,
}

/// Bundle export errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to write archive entry {name}: {reason}")]
    EntryFailed { name: String, reason: String },

    #[error("Failed to finalize archive: {reason}")]
    FinalizeFailed { reason: String },
}

/// Failure reported by a generative backend
#[derive(Error, Debug)]
#[error("Backend request failed (status {status}): {message}")]
pub struct BackendError {
    pub status: u16,
    pub message: String,
}

impl BackendError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using StorycraftError
pub type Result<T> = std::result::Result<T, StorycraftError>;

impl StorycraftError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO and network faults might be temporary
            Self::Io(_) => true,
            Self::Backend(_) => true,
            Self::Generation(GenerationError::EmptyPayload) => true,
            // Parsing and structural errors are permanent
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Decomposition(DecompositionError::EmptyDraft) => {
                "Please enter a story draft first.".to_string()
            }
            Self::Decomposition(DecompositionError::NoScenes) => {
                "The backend did not return any usable scenes. Try rewording the draft."
                    .to_string()
            }
            Self::Compile(CompileError::NoRenderableScenes) => {
                "No scene has an image or video clip yet. Generate images before compiling."
                    .to_string()
            }
            Self::Compile(CompileError::FfmpegMissing) => {
                "FFmpeg was not found on this system. Install it and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_recoverable() {
        let err: StorycraftError = BackendError::new(503, "overloaded").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parse_errors_are_not_recoverable() {
        let err: StorycraftError = DecompositionError::NoScenes.into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_user_message_for_empty_draft() {
        let err: StorycraftError = DecompositionError::EmptyDraft.into();
        assert!(err.user_message().contains("story draft"));
    }
}
