use async_trait::async_trait;

use crate::error::BackendError;
use crate::scene::AspectRatio;

/// Result of a text generation call.
///
/// Backends that honor a response schema return `Structured`; everything
/// else comes back as `Raw` and is split on the scene separator downstream.
#[derive(Debug, Clone)]
pub enum TextOutput {
    Structured(serde_json::Value),
    Raw(String),
}

/// Text generation capability.
///
/// `schema`, when present, is a JSON schema the backend is asked to conform
/// to. Backends without schema support may ignore it and return `Raw`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<TextOutput, BackendError>;
}

/// Image generation capability.
///
/// Returns raw encoded image bytes. The aspect ratio is a prompt-level
/// constraint only; callers must not assume the output shape.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Vec<u8>, BackendError>;
}
