/// Embedder trait and shared types for text embedding.
pub mod mock;

use thiserror::Error;

use crate::BoxFuture;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("embedding response parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding response had {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbedderError>>;

    /// Embed multiple text strings into vectors, in input order.
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, EmbedderError>>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}
