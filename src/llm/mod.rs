/// Completion model trait used by the synthesizer.
pub mod mock;

use thiserror::Error;

use crate::BoxFuture;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion response parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty completion response")]
    EmptyResponse,
}

/// A language model that turns a single prompt into a single completion.
pub trait CompletionModel: Send + Sync {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, CompletionError>>;
}
