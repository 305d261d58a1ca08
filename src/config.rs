//! Configuration for the ingestion and query pipelines.
//!
//! Every knob lives in [`RagConfig`], built via [`RagConfigBuilder`]. The
//! defaults reproduce the original single-user setup: a local Ollama server
//! with `llama3.2-vision` for OCR, `mxbai-embed-large` for embeddings and
//! `llama3.2` for answers, top-3 retrieval and pages rendered at 2×.

use crate::error::RagError;
use crate::pipeline::llm::CallPolicy;
use crate::progress::ProgressCallback;
use edgequake_llm::{EmbeddingProvider, LLMProvider};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// File name of the transcription snapshot inside [`RagConfig::static_dir`].
pub const SNAPSHOT_FILE_NAME: &str = "latest_transcription.json";

/// Configuration for a [`crate::service::RagService`].
///
/// # Example
/// ```rust
/// use edgequake_pdf_rag::RagConfig;
///
/// let config = RagConfig::builder()
///     .provider_name("ollama")
///     .vision_model("llama3.2-vision")
///     .top_k(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.top_k, 5);
/// ```
#[derive(Clone)]
pub struct RagConfig {
    /// Provider name passed to `ProviderFactory` ("ollama", "openai", …). Default: "ollama".
    pub provider_name: String,

    /// Vision-capable model used to transcribe page images. Default: "llama3.2-vision".
    pub vision_model: String,

    /// Embedding model. Default: "mxbai-embed-large".
    ///
    /// Every vector in the index must come from this model; the index refuses
    /// vectors tagged with any other name.
    pub embedding_model: String,

    /// Dimension requested from the embedding provider. Default: 1024 (mxbai-embed-large).
    pub embedding_dimension: usize,

    /// Text model used to answer questions. Default: "llama3.2".
    pub text_model: String,

    /// Pre-constructed provider for OCR. Takes precedence over `provider_name`.
    pub vision_provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed provider for answers. Takes precedence over `provider_name`.
    pub text_provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed embedding provider. Takes precedence over `provider_name`.
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,

    /// Sampling temperature for both chat models. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per chat completion. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts after a failed or timed-out model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    ///
    /// A vision model on a laptop can take tens of seconds for a dense page;
    /// raise this rather than letting the retry loop resend the same page.
    pub api_timeout_secs: u64,

    /// Number of retrieved pages used as context. Default: 3.
    pub top_k: usize,

    /// Linear up-scaling applied when rasterising pages. Default: 2.0.
    pub render_scale: f32,

    /// Pages of one document transcribed and embedded concurrently. Default: 1.
    ///
    /// Page order in the index and the snapshot is preserved at any value.
    pub page_concurrency: usize,

    /// Directory for the snapshot file and persisted page images. Default: "static".
    pub static_dir: PathBuf,

    /// Write each rendered page as a PNG into `static_dir`. Default: false.
    pub persist_page_images: bool,

    /// Explicit pdfium library path. Falls back to `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_library: Option<PathBuf>,

    /// Custom transcription instruction. If None, uses [`crate::prompts::TRANSCRIPTION_PROMPT`].
    pub transcription_prompt: Option<String>,

    /// Receives ingest progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            provider_name: "ollama".to_string(),
            vision_model: "llama3.2-vision".to_string(),
            embedding_model: "mxbai-embed-large".to_string(),
            embedding_dimension: 1024,
            text_model: "llama3.2".to_string(),
            vision_provider: None,
            text_provider: None,
            embedding_provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            top_k: 3,
            render_scale: 2.0,
            page_concurrency: 1,
            static_dir: PathBuf::from("static"),
            persist_page_images: false,
            pdfium_library: None,
            transcription_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RagConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagConfig")
            .field("provider_name", &self.provider_name)
            .field("vision_model", &self.vision_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("text_model", &self.text_model)
            .field(
                "vision_provider",
                &self.vision_provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .field(
                "text_provider",
                &self.text_provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .field(
                "embedding_provider",
                &self.embedding_provider.as_ref().map(|_| "<dyn EmbeddingProvider>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("top_k", &self.top_k)
            .field("render_scale", &self.render_scale)
            .field("page_concurrency", &self.page_concurrency)
            .field("static_dir", &self.static_dir)
            .field("persist_page_images", &self.persist_page_images)
            .finish()
    }
}

impl RagConfig {
    /// Create a new builder for `RagConfig`.
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of the persisted transcription snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.static_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Timeout and retry policy shared by every model call.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.api_timeout_secs),
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms,
        }
    }
}

/// Builder for [`RagConfig`].
#[derive(Debug)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    pub fn embedding_dimension(mut self, dims: usize) -> Self {
        self.config.embedding_dimension = dims;
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.config.text_model = model.into();
        self
    }

    pub fn vision_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.vision_provider = Some(provider);
        self
    }

    pub fn text_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.text_provider = Some(provider);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.config.embedding_provider = Some(provider);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn page_concurrency(mut self, n: usize) -> Self {
        self.config.page_concurrency = n.max(1);
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.static_dir = dir.into();
        self
    }

    pub fn persist_page_images(mut self, v: bool) -> Self {
        self.config.persist_page_images = v;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn transcription_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.transcription_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RagConfig, RagError> {
        let c = &self.config;
        if c.top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be ≥ 1".into()));
        }
        if !(c.render_scale > 0.0 && c.render_scale <= 8.0) {
            return Err(RagError::InvalidConfig(format!(
                "render scale must be in (0, 8], got {}",
                c.render_scale
            )));
        }
        if c.embedding_dimension == 0 {
            return Err(RagError::InvalidConfig(
                "embedding dimension must be ≥ 1".into(),
            ));
        }
        for (what, name) in [
            ("provider", &c.provider_name),
            ("vision model", &c.vision_model),
            ("embedding model", &c.embedding_model),
            ("text model", &c.text_model),
        ] {
            if name.trim().is_empty() {
                return Err(RagError::InvalidConfig(format!("{what} must not be empty")));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let c = RagConfig::default();
        assert_eq!(c.provider_name, "ollama");
        assert_eq!(c.vision_model, "llama3.2-vision");
        assert_eq!(c.embedding_model, "mxbai-embed-large");
        assert_eq!(c.text_model, "llama3.2");
        assert_eq!(c.top_k, 3);
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.snapshot_path(), PathBuf::from("static/latest_transcription.json"));
    }

    #[test]
    fn builder_rejects_zero_top_k() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_bad_scale_and_blank_models() {
        assert!(RagConfig::builder().render_scale(0.0).build().is_err());
        assert!(RagConfig::builder().render_scale(f32::NAN).build().is_err());
        assert!(RagConfig::builder().text_model("  ").build().is_err());
    }

    #[test]
    fn builder_clamps() {
        let c = RagConfig::builder()
            .temperature(5.0)
            .page_concurrency(0)
            .api_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.page_concurrency, 1);
        assert_eq!(c.api_timeout_secs, 1);
    }

    #[test]
    fn call_policy_from_config() {
        let c = RagConfig::builder()
            .api_timeout_secs(30)
            .max_retries(2)
            .retry_backoff_ms(100)
            .build()
            .unwrap();
        let p = c.call_policy();
        assert_eq!(p.timeout, Duration::from_secs(30));
        assert_eq!(p.max_retries, 2);
        assert_eq!(p.retry_backoff_ms, 100);
    }
}
