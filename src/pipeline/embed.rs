//! Text → embedding vector.
//!
//! Every vector is tagged with the model that produced it so the index can
//! refuse to mix embedding spaces.

use crate::error::ModelCallError;
use crate::index::Embedding;
use crate::pipeline::llm::{call_with_retry, CallPolicy};
use async_trait::async_trait;
use edgequake_llm::EmbeddingProvider;
use std::sync::Arc;
use tracing::debug;

/// Maps text to a fixed-dimension vector.
///
/// The same implementation must embed stored pages and questions; the index
/// enforces this through [`Embedder::model_name`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name recorded on every produced [`Embedding`].
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Embedding, ModelCallError>;
}

/// [`Embedder`] backed by an edgequake-llm embedding provider.
pub struct ProviderEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    model: String,
    policy: CallPolicy,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, model: impl Into<String>, policy: CallPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            policy,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ModelCallError> {
        let provider = &self.provider;
        let input = vec![text.to_string()];
        let input = &input;

        let values = call_with_retry(&self.policy, "Embedding", || async move {
            provider
                .embed(input)
                .await
                .map_err(|e| e.to_string())
                .map(|mut vectors| vectors.pop().unwrap_or_default())
        })
        .await?;

        debug!("Embedded {} chars → {} dims", text.len(), values.len());
        Ok(Embedding::new(self.model.clone(), values))
    }
}
