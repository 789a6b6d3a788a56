/// Deterministic embedder for tests and `--offline` runs.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};
use crate::BoxFuture;

/// Produces unit-length vectors seeded from a hash of the text.
///
/// Identical texts always map to identical vectors, so an exact-text query
/// finds its own node first. No API key is needed.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        // splitmix64 stream, mapped into [-1, 1)
        let mut embedding: Vec<f32> = (0..self.dimensions)
            .map(|_| {
                state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
                let mut z = state;
                z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                z ^= z >> 31;
                (z >> 40) as f32 / (1u64 << 23) as f32 - 1.0
            })
            .collect();

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|v| *v /= norm);
        }
        embedding
    }
}

impl Default for MockEmbedder {
    /// Same width as `text-embedding-ada-002`.
    fn default() -> Self {
        Self { dimensions: 1536 }
    }
}

impl Embedder for MockEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbedderError>> {
        Box::pin(async move { Ok(self.vector_for(text)) })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, EmbedderError>> {
        Box::pin(async move { Ok(texts.iter().map(|t| self.vector_for(t)).collect()) })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
