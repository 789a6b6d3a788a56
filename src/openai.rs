/// OpenAI-compatible HTTP client for embeddings and chat completions.
///
/// One client serves both the ingestion embedder and the synthesizer's
/// completion model; the underlying `reqwest::Client` is shared and cheap to
/// clone.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::BoxFuture;
use crate::config::OpenAiConfig;
use crate::embedder::{Embedder, EmbedderError};
use crate::llm::{CompletionError, CompletionModel};

const TEMPERATURE: f32 = 0.1;

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    completion_model: String,
    max_tokens: u32,
    dimensions: usize,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("completion_model", &self.completion_model)
            .field("max_tokens", &self.max_tokens)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OpenAiClient {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        config: &OpenAiConfig,
        dimensions: usize,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            completion_model: config.completion_model.clone(),
            max_tokens: config.max_tokens,
            dimensions,
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    async fn request_embeddings(&self, input: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input,
        };
        let (status, text) = self.post_json("/embeddings", &body).await?;

        if !status.is_success() {
            tracing::error!("OpenAI embedding API error {status}: {text}");
            return Err(EmbedderError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;
        if resp.data.len() != input.len() {
            return Err(EmbedderError::CountMismatch {
                expected: input.len(),
                got: resp.data.len(),
            });
        }
        resp.data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = resp.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                got: bad.len(),
            });
        }
        Ok(vectors)
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.completion_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: TEMPERATURE,
        };
        let (status, text) = self.post_json("/chat/completions", &body).await?;

        if !status.is_success() {
            tracing::error!("OpenAI completion API error {status}: {text}");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

impl Embedder for OpenAiClient {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbedderError>> {
        Box::pin(async move {
            let mut vectors = self.request_embeddings(&[text]).await?;
            vectors.pop().ok_or(EmbedderError::CountMismatch {
                expected: 1,
                got: 0,
            })
        })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, EmbedderError>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let input: Vec<&str> = texts.iter().map(String::as_str).collect();
            self.request_embeddings(&input).await
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl CompletionModel for OpenAiClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(self.request_completion(prompt))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
