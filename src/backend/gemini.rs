use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::backend::{ImageGenerator, TextGenerator, TextOutput};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::scene::AspectRatio;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reference backend client for the Gemini API family.
///
/// Implements both [`TextGenerator`] and [`ImageGenerator`] over plain HTTP.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    text_model: String,
    image_model: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Option<Vec<Prediction>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

impl GeminiClient {
    /// Build a client from configuration, reading the API key from the
    /// environment variable named in `config.api_key_env`.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            BackendError::new(401, format!("missing API key in ${}", config.api_key_env))
        })?;

        Ok(Self::new(
            api_key,
            config.text_model.clone(),
            config.image_model.clone(),
            Duration::from_secs(config.timeout_seconds),
        ))
    }

    pub fn new(
        api_key: String,
        text_model: String,
        image_model: String,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self { api_key, text_model, image_model, client }
    }

    async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::new(0, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::new(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::new(status.as_u16(), format!("malformed payload: {e}")))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(
        &self,
        prompt: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<TextOutput, BackendError> {
        info!("Requesting text generation from {}", self.text_model);

        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        if let Some(schema) = schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            });
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.text_model, self.api_key
        );

        let payload: GenerateContentResponse =
            serde_json::from_value(self.post_json(&url, body).await?)
                .map_err(|e| BackendError::new(200, format!("malformed payload: {e}")))?;

        let text = payload
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| BackendError::new(200, "response contained no text"))?;

        debug!("Received {} chars of generated text", text.len());

        if schema.is_some() {
            // Schema-constrained responses come back as a JSON document in
            // the text part; fall back to raw if it does not parse.
            match serde_json::from_str(&text) {
                Ok(value) => return Ok(TextOutput::Structured(value)),
                Err(e) => debug!("Structured parse failed, degrading to raw: {e}"),
            }
        }

        Ok(TextOutput::Raw(text))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Vec<u8>, BackendError> {
        info!("Requesting image generation from {}", self.image_model);

        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": aspect_ratio.as_str(),
            }
        });

        let url = format!(
            "{}/{}:predict?key={}",
            GEMINI_API_BASE, self.image_model, self.api_key
        );

        let payload: PredictResponse = serde_json::from_value(self.post_json(&url, body).await?)
            .map_err(|e| BackendError::new(200, format!("malformed payload: {e}")))?;

        let encoded = payload
            .predictions
            .and_then(|mut p| p.drain(..).next())
            .and_then(|p| p.bytes_base64_encoded)
            .ok_or_else(|| BackendError::new(200, "response contained no image data"))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| BackendError::new(200, format!("invalid image encoding: {e}")))?;

        debug!("Received {} bytes of image data", bytes.len());
        Ok(bytes)
    }
}
