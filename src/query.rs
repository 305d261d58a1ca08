//! Query: question → retrieved pages → grounded answer.

use crate::error::RagError;
use crate::index::{RetrievedEntry, VectorStore};
use crate::output::QueryAnswer;
use crate::pipeline::embed::Embedder;
use crate::pipeline::llm::Generator;
use crate::prompts::{grounded_user_message, GROUNDING_SYSTEM_PROMPT};
use std::sync::Arc;
use tracing::{debug, info};

/// Embeds a question, retrieves the closest pages and asks the text model.
///
/// An empty index is not an error: the generator still runs, with an empty
/// context, and the answer carries no sources.
pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            top_k: top_k.max(1),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<QueryAnswer, RagError> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }

        let embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(|source| RagError::Retrieval { source })?;

        let matches = self.store.query(&embedding, self.top_k).await?;
        debug!(
            "Retrieved {} page(s): {:?}",
            matches.len(),
            matches.iter().map(|m| (&m.id, m.score)).collect::<Vec<_>>()
        );

        let context = build_context(&matches);
        let user = grounded_user_message(&context, question);

        let response = self
            .generator
            .generate(GROUNDING_SYSTEM_PROMPT, &user)
            .await
            .map_err(|source| RagError::Generation { source })?;

        let sources = dedup_sources(&matches);
        info!("Answered from {} page(s), sources {:?}", matches.len(), sources);

        Ok(QueryAnswer {
            response,
            sources,
            context,
            matches,
        })
    }
}

/// Retrieved texts in rank order, joined by a single newline.
pub fn build_context(matches: &[RetrievedEntry]) -> String {
    matches
        .iter()
        .map(|m| m.document_text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Filenames of `matches`, first occurrence wins.
pub fn dedup_sources(matches: &[RetrievedEntry]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for m in matches {
        if !sources.contains(&m.metadata.filename) {
            sources.push(m.metadata.filename.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntryMetadata;

    fn hit(id: &str, file: &str, text: &str) -> RetrievedEntry {
        RetrievedEntry {
            id: id.into(),
            score: 0.5,
            document_text: text.into(),
            metadata: EntryMetadata {
                filename: file.into(),
            },
        }
    }

    #[test]
    fn context_joins_with_single_newline() {
        let hits = [
            hit("a.pdf_page_1", "a.pdf", "second"),
            hit("a.pdf_page_0", "a.pdf", "first"),
        ];
        assert_eq!(build_context(&hits), "second\nfirst");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn sources_are_deduplicated_in_rank_order() {
        let hits = [
            hit("b.pdf_page_0", "b.pdf", "x"),
            hit("a.pdf_page_0", "a.pdf", "y"),
            hit("b.pdf_page_1", "b.pdf", "z"),
        ];
        assert_eq!(dedup_sources(&hits), vec!["b.pdf", "a.pdf"]);
    }
}
