//! Single-shot question answering over retrieved context.
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{CompletionError, CompletionModel};
use crate::retriever::{RetrievalError, Retriever, ScoredMatch};

/// Returned without calling the model when retrieval finds nothing.
pub const EMPTY_RESPONSE: &str = "Empty Response";

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
}

pub struct Synthesizer {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn CompletionModel>,
    top_k: usize,
}

impl Synthesizer {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn CompletionModel>, top_k: usize) -> Self {
        Self {
            retriever,
            llm,
            top_k,
        }
    }

    /// Retrieves context for `query` and returns the model's raw answer.
    pub async fn synthesize(&self, query: &str) -> Result<String, SynthesisError> {
        let matches = self.retriever.retrieve(query, self.top_k).await?;
        if matches.is_empty() {
            info!("No context retrieved, skipping completion");
            return Ok(EMPTY_RESPONSE.to_string());
        }

        let prompt = build_prompt(query, &matches);
        debug!(context_nodes = matches.len(), prompt_len = prompt.len(), "Synthesizing");
        Ok(self.llm.complete(&prompt).await?)
    }
}

/// Question-answering prompt over the matched node texts.
#[must_use]
pub fn build_prompt(query: &str, matches: &[ScoredMatch]) -> String {
    let context = matches
        .iter()
        .map(|m| m.node.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}
