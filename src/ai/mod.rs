//! AI provider access: audio transcription and image description.
//!
//! [`AiService`] is the seam the route handlers and the alt-text orchestrator
//! depend on. [`OpenAiService`] is the production implementation: it calls the
//! OpenAI-style transcription endpoint directly and routes vision requests
//! through `edgequake-llm`, so any vision-capable provider can write alt text.

pub mod encode;
pub mod openai;
pub mod postprocess;

pub use openai::{resolve_provider, OpenAiService};

use crate::error::ServiceError;
use async_trait::async_trait;
use edgequake_llm::ImageData;

/// One model answer for one image, before cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltTextDraft {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[async_trait]
pub trait AiService: Send + Sync {
    /// Transcribe an uploaded audio clip.
    async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, ServiceError>;

    /// Describe one image for use as alternate text.
    async fn describe_image(
        &self,
        image: ImageData,
        context: Option<&str>,
    ) -> Result<AltTextDraft, ServiceError>;
}
