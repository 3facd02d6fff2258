//! # Generative Backend Module
//!
//! Abstract capability traits for text and image generation, plus the
//! reference Gemini HTTP client.

mod gemini;
mod traits;

pub use gemini::GeminiClient;
pub use traits::{ImageGenerator, TextGenerator, TextOutput};
