//! Service configuration.
//!
//! Every knob lives in [`ServiceConfig`], built through
//! [`ServiceConfigBuilder`] so callers set only what they care about and rely
//! on documented defaults for the rest. `build()` validates the combination;
//! the binary maps its flags and environment variables onto the builder.

use crate::error::ConfigError;
use crate::remediate::DocumentDefaults;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the remediation service.
///
/// # Example
/// ```rust
/// use edgequake_pdf_a11y::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .jwt_secret("change-me-in-production")
///     .checker_base_url("https://checker.example.com/api")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds. Default: `0.0.0.0:8080`.
    pub bind_addr: String,

    /// SQLite URL for the record store. `None` keeps records in memory,
    /// which loses them on restart.
    pub database_url: Option<String>,

    /// Root directory of the filesystem object store. Default: `./data/objects`.
    pub storage_dir: PathBuf,

    /// Base URL of the accessibility checker (`{base}/init`, `{base}/check-status`).
    pub checker_base_url: String,
    pub checker_api_key: Option<String>,

    /// Base URL of the OpenAI-style API. Default: `https://api.openai.com/v1`.
    pub ai_api_base: String,
    pub ai_api_key: Option<String>,

    /// Model for `/audio/transcriptions`. Default: `whisper-1`.
    pub transcription_model: String,

    /// Vision model for alt text. If None, uses the provider default.
    pub alt_text_model: Option<String>,

    /// LLM provider name for alt text (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed vision provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Custom alt-text system prompt. If None, uses the built-in default.
    pub alt_text_prompt: Option<String>,

    /// Sampling temperature for alt text. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per alt-text answer. Default: 300.
    pub max_tokens: usize,

    /// Number of concurrent vision calls in one alt-text batch. Default: 4.
    pub concurrency: usize,

    /// Longest image edge sent to the vision model, in pixels. Default: 1024.
    pub max_image_edge: u32,

    /// USD per million input tokens, used for the reported alt-text cost. Default: 0.10.
    pub input_price_per_million: f64,

    /// USD per million output tokens. Default: 0.40.
    pub output_price_per_million: f64,

    /// HMAC secret for HS256 bearer tokens. Required.
    pub jwt_secret: String,

    /// Timeout for every outbound HTTP call, in seconds. Default: 60.
    pub http_timeout_secs: u64,

    /// Largest accepted request body, in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Author / subject / language written into remediated documents.
    pub document: DocumentDefaults,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            storage_dir: PathBuf::from("./data/objects"),
            checker_base_url: "http://localhost:9000".to_string(),
            checker_api_key: None,
            ai_api_base: "https://api.openai.com/v1".to_string(),
            ai_api_key: None,
            transcription_model: "whisper-1".to_string(),
            alt_text_model: None,
            provider_name: None,
            provider: None,
            alt_text_prompt: None,
            temperature: 0.2,
            max_tokens: 300,
            concurrency: 4,
            max_image_edge: 1024,
            input_price_per_million: 0.10,
            output_price_per_million: 0.40,
            jwt_secret: String::new(),
            http_timeout_secs: 60,
            max_upload_bytes: 50 * 1024 * 1024,
            document: DocumentDefaults::default(),
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url)
            .field("storage_dir", &self.storage_dir)
            .field("checker_base_url", &self.checker_base_url)
            .field("checker_api_key", &redact(&self.checker_api_key))
            .field("ai_api_base", &self.ai_api_base)
            .field("ai_api_key", &redact(&self.ai_api_key))
            .field("transcription_model", &self.transcription_model)
            .field("alt_text_model", &self.alt_text_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("concurrency", &self.concurrency)
            .field("max_image_edge", &self.max_image_edge)
            .field("jwt_secret", &"<redacted>")
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("document", &self.document)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// USD cost of a batch with the given token totals.
    pub fn cost_usd(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        (input_tokens as f64 * self.input_price_per_million
            + output_tokens as f64 * self.output_price_per_million)
            / 1_000_000.0
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn checker_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.checker_base_url = url.into();
        self
    }

    pub fn checker_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.checker_api_key = Some(key.into());
        self
    }

    pub fn ai_api_base(mut self, url: impl Into<String>) -> Self {
        self.config.ai_api_base = url.into();
        self
    }

    pub fn ai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ai_api_key = Some(key.into());
        self
    }

    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription_model = model.into();
        self
    }

    pub fn alt_text_model(mut self, model: impl Into<String>) -> Self {
        self.config.alt_text_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn alt_text_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.alt_text_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_image_edge(mut self, px: u32) -> Self {
        self.config.max_image_edge = px.max(64);
        self
    }

    pub fn prices_per_million(mut self, input: f64, output: f64) -> Self {
        self.config.input_price_per_million = input;
        self.config.output_price_per_million = output;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn document_defaults(mut self, defaults: DocumentDefaults) -> Self {
        self.config.document = defaults;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        let c = &self.config;
        if c.jwt_secret.trim().is_empty() {
            return Err(ConfigError("JWT secret must not be empty".into()));
        }
        for (name, url) in [
            ("checker base URL", &c.checker_base_url),
            ("AI API base URL", &c.ai_api_base),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if c.http_timeout_secs == 0 {
            return Err(ConfigError("HTTP timeout must be ≥ 1 second".into()));
        }
        if c.input_price_per_million < 0.0 || c.output_price_per_million < 0.0 {
            return Err(ConfigError("token prices must not be negative".into()));
        }
        if c.document.language.trim().is_empty() {
            return Err(ConfigError("document language must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_jwt_secret() {
        let err = ServiceConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("JWT"));
        assert!(ServiceConfig::builder().jwt_secret("s").build().is_ok());
    }

    #[test]
    fn build_rejects_non_http_urls() {
        let err = ServiceConfig::builder()
            .jwt_secret("s")
            .checker_base_url("ftp://checker")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("checker base URL"));
    }

    #[test]
    fn builder_clamps() {
        let c = ServiceConfig::builder()
            .jwt_secret("s")
            .concurrency(0)
            .temperature(9.0)
            .max_image_edge(1)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_image_edge, 64);
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = ServiceConfig::builder()
            .jwt_secret("super-secret-value")
            .ai_api_key("sk-live-123")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(!dbg.contains("sk-live-123"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn cost_uses_per_million_prices() {
        let c = ServiceConfig::builder()
            .jwt_secret("s")
            .prices_per_million(1.0, 2.0)
            .build()
            .unwrap();
        let cost = c.cost_usd(1_000_000, 500_000);
        assert!((cost - 2.0).abs() < 1e-9);
    }
}
