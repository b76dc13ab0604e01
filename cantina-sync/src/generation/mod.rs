//! Text and image generation capability
//!
//! Enrichment stages talk to the provider through [`Generator`] only. Prompt
//! wording lives in each stage; the provider just turns text into text or an image.

pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

/// Generation errors. Isolated to the single item being enriched.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("Unusable response: {0}")]
    Unusable(String),

    #[error("Image download failed: {0}")]
    DownloadError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Image produced by the provider, already downloaded
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// Prompt as rewritten by the provider, if it reports one
    pub revised_prompt: Option<String>,
}

/// Text/image generation provider
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt` under the `system` instruction, returning free text
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;

    /// Generate and download one image for `prompt`
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}
