//! Query-time retrieval: embed the query, ask the vector index for its
//! nearest nodes and pair each node with its similarity.
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::BoxFuture;
use crate::embedder::{Embedder, EmbedderError};
use crate::models::Node;
use crate::vector_store::{QueryMode, VectorIndex, VectorQuery, VectorStoreError};

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retrieval unavailable: {0}")]
    Unavailable(#[from] VectorStoreError),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("top_k must be at least 1")]
    InvalidTopK,
}

/// A retrieved node and its similarity to the query.
///
/// `score` is `None` when the query mode does not produce similarities.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMatch {
    pub node: Node,
    pub score: Option<f32>,
}

pub trait Retriever: Send + Sync {
    /// Up to `top_k` matches for `query`, best first.
    fn retrieve<'a>(
        &'a self,
        query: &'a str,
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredMatch>, RetrievalError>>;
}

/// Retriever backed by a [`VectorIndex`] and the embedder used at ingestion.
pub struct VectorIndexRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    mode: QueryMode,
}

impl VectorIndexRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, mode: QueryMode) -> Self {
        Self {
            index,
            embedder,
            mode,
        }
    }

    async fn run(&self, query: &str, top_k: usize) -> Result<Vec<ScoredMatch>, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }

        let embedding = self.embedder.embed(query).await?;
        let request = VectorQuery {
            embedding,
            top_k,
            mode: self.mode,
        };
        let result = self.index.query(&request).await?;

        let mut matches: Vec<ScoredMatch> = match result.similarities {
            Some(scores) => result
                .nodes
                .into_iter()
                .zip(scores)
                .map(|(node, score)| ScoredMatch {
                    node,
                    score: Some(score),
                })
                .collect(),
            None => result
                .nodes
                .into_iter()
                .map(|node| ScoredMatch { node, score: None })
                .collect(),
        };

        // Unscored results keep the index's order.
        if matches.iter().all(|m| m.score.is_some()) {
            matches.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        matches.truncate(top_k);

        debug!(matches = matches.len(), top_k, "Retrieved");
        Ok(matches)
    }
}

impl Retriever for VectorIndexRetriever {
    fn retrieve<'a>(
        &'a self,
        query: &'a str,
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredMatch>, RetrievalError>> {
        Box::pin(self.run(query, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use crate::models::Metadata;
    use crate::vector_store::memory::InMemoryIndex;
    use crate::vector_store::{IndexSpec, Metric};

    const DIM: usize = 16;

    async fn seeded_index(texts: &[&str]) -> Arc<InMemoryIndex> {
        let embedder = MockEmbedder::new(DIM);
        let index = Arc::new(InMemoryIndex::new());
        index
            .create_index(&IndexSpec {
                name: "notes".into(),
                dimension: DIM,
                metric: Metric::Euclidean,
                pod_type: "p1".into(),
            })
            .await
            .unwrap();

        let mut nodes = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            nodes.push(Node {
                id: format!("doc.md:{i}|0"),
                ref_doc_id: format!("doc.md:{i}"),
                text: (*text).to_string(),
                metadata: Metadata::new(),
                embedding: Some(embedder.embed(text).await.unwrap()),
            });
        }
        index.upsert(&nodes).await.unwrap();
        index
    }

    fn retriever(index: Arc<InMemoryIndex>, mode: QueryMode) -> VectorIndexRetriever {
        VectorIndexRetriever::new(index, Arc::new(MockEmbedder::new(DIM)), mode)
    }

    #[tokio::test]
    async fn test_top_k_exceeding_index_size() {
        let index = seeded_index(&["only vector"]).await;
        let matches = retriever(index, QueryMode::Default)
            .retrieve("x", 3)
            .await
            .unwrap();
        assert!(matches.len() <= 1);
    }

    #[tokio::test]
    async fn test_exact_text_ranks_first() {
        let index = seeded_index(&["alpha notes", "beta notes", "gamma notes"]).await;
        let matches = retriever(index, QueryMode::Default)
            .retrieve("beta notes", 3)
            .await
            .unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].node.text, "beta notes");
        assert_eq!(matches[0].score, Some(1.0));

        let scores: Vec<f32> = matches.iter().map(|m| m.score.unwrap()).collect();
        assert!(
            scores.windows(2).all(|w| w[0] >= w[1]),
            "scores not descending: {scores:?}"
        );
    }

    #[tokio::test]
    async fn test_mmr_mode_has_null_scores() {
        let index = seeded_index(&["one", "two", "three"]).await;
        let matches = retriever(index, QueryMode::Mmr { lambda: 0.5 })
            .retrieve("one", 2)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.score.is_none()));
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let index = seeded_index(&["one"]).await;
        let err = retriever(index, QueryMode::Default)
            .retrieve("one", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidTopK));
    }

    #[tokio::test]
    async fn test_missing_index_is_unavailable() {
        let index = Arc::new(InMemoryIndex::new());
        let err = retriever(index, QueryMode::Default)
            .retrieve("anything", 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Unavailable(VectorStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_scored_match_json_shape() {
        let m = ScoredMatch {
            node: Node {
                id: "a.md#Intro|0".into(),
                ref_doc_id: "a.md#Intro".into(),
                text: "hello".into(),
                metadata: Metadata::new(),
                embedding: None,
            },
            score: None,
        };
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["node"]["id"], "a.md#Intro|0");
        assert!(value["score"].is_null());
        assert!(value["node"].get("embedding").is_none());
    }
}
