use std::collections::BTreeMap;
use std::sync::RwLock;

use super::mmr::{cosine_similarity, mmr_select};
use super::{
    IndexSpec, Metric, QueryMode, VectorIndex, VectorQuery, VectorQueryResult, VectorStoreError,
    require_embedding,
};
use crate::BoxFuture;
use crate::models::Node;

struct Collection {
    spec: IndexSpec,
    nodes: BTreeMap<String, Node>,
}

/// Process-local vector index.
///
/// Backs `--offline` runs and tests; everything is lost when the process exits.
pub struct InMemoryIndex {
    collection: RwLock<Option<Collection>>,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collection: RwLock::new(None),
        }
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.collection
            .read()
            .ok()
            .and_then(|c| c.as_ref().map(|c| c.nodes.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn raw_score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::Dotproduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        Metric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
    }
}

fn poisoned(e: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Api {
        status: 500,
        body: format!("in-memory index lock poisoned: {e}"),
    }
}

impl VectorIndex for InMemoryIndex {
    fn create_index<'a>(
        &'a self,
        spec: &'a IndexSpec,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let mut guard = self.collection.write().map_err(poisoned)?;
            if let Some(existing) = guard.as_ref() {
                return Err(VectorStoreError::AlreadyExists(existing.spec.name.clone()));
            }
            *guard = Some(Collection {
                spec: spec.clone(),
                nodes: BTreeMap::new(),
            });
            Ok(())
        })
    }

    fn upsert<'a>(&'a self, nodes: &'a [Node]) -> BoxFuture<'a, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            let mut guard = self.collection.write().map_err(poisoned)?;
            let collection = guard
                .as_mut()
                .ok_or_else(|| VectorStoreError::NotFound("in-memory".to_string()))?;

            for node in nodes {
                let embedding = require_embedding(node)?;
                if embedding.len() != collection.spec.dimension {
                    return Err(VectorStoreError::DimensionMismatch {
                        expected: collection.spec.dimension,
                        got: embedding.len(),
                    });
                }
            }
            for node in nodes {
                collection.nodes.insert(node.id.clone(), node.clone());
            }
            Ok(nodes.len())
        })
    }

    fn query<'a>(
        &'a self,
        query: &'a VectorQuery,
    ) -> BoxFuture<'a, Result<VectorQueryResult, VectorStoreError>> {
        Box::pin(async move {
            let guard = self.collection.read().map_err(poisoned)?;
            let collection = guard
                .as_ref()
                .ok_or_else(|| VectorStoreError::NotFound("in-memory".to_string()))?;
            if query.embedding.len() != collection.spec.dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: collection.spec.dimension,
                    got: query.embedding.len(),
                });
            }

            let metric = collection.spec.metric;
            let mut scored: Vec<(f32, &Node)> = collection
                .nodes
                .values()
                .filter_map(|node| {
                    let embedding = node.embedding.as_deref()?;
                    let score = metric.similarity(raw_score(metric, &query.embedding, embedding));
                    Some((score, node))
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            let strip = |node: &Node| Node {
                embedding: None,
                ..node.clone()
            };

            match query.mode {
                QueryMode::Default => {
                    scored.truncate(query.top_k);
                    Ok(VectorQueryResult {
                        similarities: Some(scored.iter().map(|(s, _)| *s).collect()),
                        nodes: scored.iter().map(|(_, n)| strip(n)).collect(),
                    })
                }
                QueryMode::Mmr { lambda } => {
                    scored.truncate(query.mode.fetch_k(query.top_k));
                    let vectors: Vec<&[f32]> = scored
                        .iter()
                        .filter_map(|(_, n)| n.embedding.as_deref())
                        .collect();
                    let picked = mmr_select(&query.embedding, &vectors, query.top_k, lambda);
                    Ok(VectorQueryResult {
                        nodes: picked.into_iter().map(|i| strip(scored[i].1)).collect(),
                        similarities: None,
                    })
                }
            }
        })
    }
}
