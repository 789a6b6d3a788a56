use std::sync::Mutex;

use super::{CompletionError, CompletionModel};
use crate::BoxFuture;

/// A scripted completion model for tests and offline runs.
///
/// Without a scripted reply it echoes the prompt back. Every prompt it
/// receives is recorded.
#[derive(Debug, Default)]
pub struct MockCompletionModel {
    reply: Option<String>,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// A model whose every call fails with an API error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CompletionModel for MockCompletionModel {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(async move {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            if self.fail {
                return Err(CompletionError::Api {
                    status: 503,
                    body: "mock completion failure".to_string(),
                });
            }
            Ok(self.reply.clone().unwrap_or_else(|| prompt.to_string()))
        })
    }
}
