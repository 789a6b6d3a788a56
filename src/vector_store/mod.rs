//! Vector index abstraction: index creation, upserts and similarity queries.
pub mod memory;
pub mod mmr;
pub mod pinecone;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::BoxFuture;
use crate::models::Node;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("index {0} already exists")]
    AlreadyExists(String),

    #[error("index {0} not found")]
    NotFound(String),

    #[error("vector index unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("vector index returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("vector index response parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node {0} has no embedding")]
    MissingEmbedding(String),

    #[error("vector has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index {0} did not become ready in time")]
    NotReady(String),
}

/// Similarity metric of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Dotproduct,
}

impl Metric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dotproduct => "dotproduct",
        }
    }

    /// Maps a raw index score onto "higher is more similar".
    ///
    /// Euclidean indexes report a distance, which becomes `1 / (1 + d)`.
    #[must_use]
    pub fn similarity(self, raw: f32) -> f32 {
        match self {
            Self::Euclidean => 1.0 / (1.0 + raw.max(0.0)),
            Self::Cosine | Self::Dotproduct => raw,
        }
    }
}

/// Parameters used to create an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    /// Hardware tier, e.g. Pinecone's `p1`.
    pub pod_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum QueryMode {
    /// Dense nearest-neighbour search.
    #[default]
    Default,
    /// Maximal marginal relevance re-ranking. Reports no similarities.
    Mmr { lambda: f32 },
}

impl QueryMode {
    /// Candidate pool fetched before MMR re-ranking, as a multiple of `top_k`.
    pub const MMR_FETCH_MULTIPLIER: usize = 4;

    /// Number of candidates to pull from the index for a `top_k` request.
    #[must_use]
    pub fn fetch_k(self, top_k: usize) -> usize {
        match self {
            Self::Default => top_k,
            Self::Mmr { .. } => top_k.saturating_mul(Self::MMR_FETCH_MULTIPLIER),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub embedding: Vec<f32>,
    pub top_k: usize,
    pub mode: QueryMode,
}

/// Nodes nearest to a query, best first. `similarities` is parallel to
/// `nodes` when the query mode reports scores.
#[derive(Debug, Clone, Default)]
pub struct VectorQueryResult {
    pub nodes: Vec<Node>,
    pub similarities: Option<Vec<f32>>,
}

/// A remote or local vector index bound to one index name.
pub trait VectorIndex: Send + Sync {
    /// Create the index. Fails with [`VectorStoreError::AlreadyExists`] if it exists.
    fn create_index<'a>(&'a self, spec: &'a IndexSpec)
    -> BoxFuture<'a, Result<(), VectorStoreError>>;

    /// Insert or replace nodes; every node must carry an embedding.
    fn upsert<'a>(&'a self, nodes: &'a [Node]) -> BoxFuture<'a, Result<usize, VectorStoreError>>;

    fn query<'a>(
        &'a self,
        query: &'a VectorQuery,
    ) -> BoxFuture<'a, Result<VectorQueryResult, VectorStoreError>>;
}

/// Creates the index unless it already exists.
pub async fn ensure_index(
    index: &dyn VectorIndex,
    spec: &IndexSpec,
) -> Result<(), VectorStoreError> {
    match index.create_index(spec).await {
        Ok(()) => {
            info!(
                index = %spec.name,
                dimension = spec.dimension,
                metric = spec.metric.as_str(),
                "Created index"
            );
            Ok(())
        }
        Err(VectorStoreError::AlreadyExists(name)) => {
            info!(index = %name, "Index already exists, reusing it");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn require_embedding(node: &Node) -> Result<&[f32], VectorStoreError> {
    node.embedding
        .as_deref()
        .ok_or_else(|| VectorStoreError::MissingEmbedding(node.id.clone()))
}
