//! Production [`AiService`]: OpenAI-style transcription plus `edgequake-llm`
//! vision chat for alt text.

use super::{AiService, AltTextDraft};
use crate::config::ServiceConfig;
use crate::error::{ConfigError, ServiceError};
use crate::prompts::{alt_text_request, ALT_TEXT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROVIDER: &str = "openai";
const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

pub struct OpenAiService {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    transcription_model: String,
    vision: Option<Arc<dyn LLMProvider>>,
    system_prompt: String,
    options: CompletionOptions,
}

impl OpenAiService {
    /// `vision` is usually the result of [`resolve_provider`]; `None` makes
    /// every alt-text request fail (and degrade to the placeholder).
    pub fn new(
        config: &ServiceConfig,
        vision: Option<Arc<dyn LLMProvider>>,
    ) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ConfigError(format!("AI HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: config.ai_api_base.trim_end_matches('/').to_string(),
            api_key: config.ai_api_key.clone(),
            transcription_model: config.transcription_model.clone(),
            vision,
            system_prompt: config
                .alt_text_prompt
                .clone()
                .unwrap_or_else(|| ALT_TEXT_SYSTEM_PROMPT.to_string()),
            options: alt_text_options(config),
        })
    }
}

fn alt_text_options(config: &ServiceConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ConfigError> {
    ProviderFactory::create_llm_provider(provider_name, model)
        .map_err(|e| ConfigError(format!("vision provider '{provider_name}': {e}")))
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, even if other keys are too.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn LLMProvider>, ConfigError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config
        .alt_text_model
        .as_deref()
        .unwrap_or(DEFAULT_VISION_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        ConfigError(format!(
            "no vision provider could be auto-detected from the environment \
             (set OPENAI_API_KEY or EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL): {e}"
        ))
    })?;
    Ok(llm_provider)
}

/// Map a non-success transcription response onto the provider error taxonomy.
fn transcription_error(status: StatusCode, body: &str) -> ServiceError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status.as_u16() {
        429 => ServiceError::QuotaExceeded {
            provider: PROVIDER.into(),
        },
        401 | 403 => ServiceError::AuthError {
            provider: PROVIDER.into(),
            detail,
        },
        400 | 415 => ServiceError::BadInput {
            provider: PROVIDER.into(),
            detail,
        },
        _ => ServiceError::TranscriptionFailed(detail),
    }
}

#[async_trait]
impl AiService for OpenAiService {
    async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, ServiceError> {
        let key = self.api_key.as_deref().ok_or_else(|| ServiceError::AuthError {
            provider: PROVIDER.into(),
            detail: "no API key configured".into(),
        })?;

        info!("Transcribing '{}' ({} bytes)", file_name, audio.len());
        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| ServiceError::BadInput {
                provider: PROVIDER.into(),
                detail: format!("invalid content type '{mime_type}': {e}"),
            })?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone());

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::TranscriptionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = transcription_error(status, &body);
            warn!("Transcription rejected: {}", err);
            return Err(err);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::TranscriptionFailed(format!("body is not JSON: {e}")))?;
        body.get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::TranscriptionFailed("response has no 'text' field".into()))
    }

    async fn describe_image(
        &self,
        image: ImageData,
        context: Option<&str>,
    ) -> Result<AltTextDraft, ServiceError> {
        let Some(ref provider) = self.vision else {
            return Err(ServiceError::AltTextFailed(
                "no vision provider configured".into(),
            ));
        };

        let start = Instant::now();
        let request = alt_text_request(context);
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(request.as_str(), vec![image]),
        ];

        let response = provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ServiceError::AltTextFailed(e.to_string()))?;

        debug!(
            "Alt text: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(AltTextDraft {
            text: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}
