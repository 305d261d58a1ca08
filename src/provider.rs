//! Provider resolution for the three models.
//!
//! Each model is resolved from most-specific to least-specific:
//!
//! 1. **Pre-built provider** on [`RagConfig`]: used as-is. Tests and callers
//!    that need custom middleware (caching, rate-limiting) go this way.
//! 2. **Named provider + model** (`provider_name`, `*_model`): built with
//!    [`ProviderFactory`], which reads any API key (`OPENAI_API_KEY`, …) or
//!    host (`OLLAMA_HOST`) from the environment.
//! 3. **Auto-detection** when the provider name is `"auto"`: only the provider
//!    *name* comes from the environment (`EDGEQUAKE_LLM_PROVIDER`, then the
//!    first known API key or host variable). The configured model names are
//!    kept, so the vision model stays vision-capable and the embedding model
//!    recorded on every vector is the one that produced it.

use crate::config::RagConfig;
use crate::error::RagError;
use edgequake_llm::{EmbeddingProvider, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::info;

/// Provider name that selects environment auto-detection.
pub const AUTO_PROVIDER: &str = "auto";

/// Environment variables checked by auto-detection, in priority order.
const DETECTION_ORDER: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "openai"),
    ("ANTHROPIC_API_KEY", "anthropic"),
    ("GEMINI_API_KEY", "gemini"),
    ("OLLAMA_HOST", "ollama"),
];

/// Provider and model names the factory will be asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPlan {
    pub provider: String,
    pub vision_model: String,
    pub text_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

impl ProviderPlan {
    /// Resolve `"auto"` against the process environment.
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        Self::with_env(config, |key| std::env::var(key).ok())
    }

    /// Resolve `"auto"` with `lookup` standing in for the environment.
    pub fn with_env(
        config: &RagConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RagError> {
        let provider = if config.provider_name == AUTO_PROVIDER {
            detect_provider(&lookup)?
        } else {
            config.provider_name.clone()
        };

        Ok(Self {
            provider,
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dimension: config.embedding_dimension,
        })
    }
}

fn detect_provider(lookup: &impl Fn(&str) -> Option<String>) -> Result<String, RagError> {
    let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(name) = set("EDGEQUAKE_LLM_PROVIDER") {
        if name != AUTO_PROVIDER {
            return Ok(name);
        }
    }

    DETECTION_ORDER
        .iter()
        .find(|(key, _)| set(key).is_some())
        .map(|(_, name)| name.to_string())
        .ok_or_else(|| RagError::ProviderNotConfigured {
            provider: AUTO_PROVIDER.to_string(),
            hint: "No provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, OLLAMA_HOST, \
                or pass --provider."
                .to_string(),
        })
}

/// Resolve the provider used for page transcription.
pub fn resolve_vision_provider(config: &RagConfig) -> Result<Arc<dyn LLMProvider>, RagError> {
    if let Some(ref provider) = config.vision_provider {
        return Ok(Arc::clone(provider));
    }
    let plan = ProviderPlan::from_config(config)?;
    create_chat(&plan.provider, &plan.vision_model)
}

/// Resolve the provider used for answer generation.
pub fn resolve_text_provider(config: &RagConfig) -> Result<Arc<dyn LLMProvider>, RagError> {
    if let Some(ref provider) = config.text_provider {
        return Ok(Arc::clone(provider));
    }
    let plan = ProviderPlan::from_config(config)?;
    create_chat(&plan.provider, &plan.text_model)
}

/// Resolve the provider used for page and question embeddings.
pub fn resolve_embedding_provider(
    config: &RagConfig,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    if let Some(ref provider) = config.embedding_provider {
        return Ok(Arc::clone(provider));
    }
    let plan = ProviderPlan::from_config(config)?;

    info!(
        "Embedding provider: {} / {} ({} dims)",
        plan.provider, plan.embedding_model, plan.embedding_dimension
    );
    ProviderFactory::create_embedding_provider(
        &plan.provider,
        &plan.embedding_model,
        plan.embedding_dimension,
    )
    .map_err(|e| not_configured(&plan.provider, e))
}

fn create_chat(provider: &str, model: &str) -> Result<Arc<dyn LLMProvider>, RagError> {
    info!("Chat provider: {} / {}", provider, model);
    ProviderFactory::create_llm_provider(provider, model).map_err(|e| not_configured(provider, e))
}

fn not_configured(provider: &str, e: impl std::fmt::Display) -> RagError {
    RagError::ProviderNotConfigured {
        provider: provider.to_string(),
        hint: format!("{e}"),
    }
}
