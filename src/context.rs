//! Process-wide clients, built once at startup and shared by every component.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{Config, Secrets};
use crate::embedder::Embedder;
use crate::embedder::mock::MockEmbedder;
use crate::indexer::{Indexer, KnowledgeBaseLoader};
use crate::llm::CompletionModel;
use crate::llm::mock::MockCompletionModel;
use crate::openai::OpenAiClient;
use crate::retriever::{Retriever, VectorIndexRetriever};
use crate::server::AppState;
use crate::synthesizer::Synthesizer;
use crate::vector_store::VectorIndex;
use crate::vector_store::memory::InMemoryIndex;
use crate::vector_store::pinecone::PineconeVectorStore;

pub struct AppContext {
    pub config: Config,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn CompletionModel>,
}

impl AppContext {
    /// Pinecone for storage, OpenAI for embeddings and completions.
    pub fn connect(config: Config, secrets: &Secrets) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let openai = Arc::new(OpenAiClient::new(
            client.clone(),
            secrets.openai_api_key.clone(),
            &config.openai,
            config.index.dimension,
        ));
        let index = PineconeVectorStore::new(
            client,
            secrets.pinecone_api_key.clone(),
            &secrets.pinecone_environment,
            config.index.name.clone(),
            config.index.metric,
        )
        .with_namespace(config.index.namespace.clone());

        Ok(Self {
            index: Arc::new(index),
            embedder: openai.clone(),
            llm: openai,
            config,
        })
    }

    /// In-process index with deterministic embeddings and an echoing model.
    #[must_use]
    pub fn offline(config: Config) -> Self {
        Self {
            index: Arc::new(InMemoryIndex::new()),
            embedder: Arc::new(MockEmbedder::new(config.index.dimension)),
            llm: Arc::new(MockCompletionModel::new()),
            config,
        }
    }

    #[must_use]
    pub fn loader(&self) -> KnowledgeBaseLoader {
        KnowledgeBaseLoader::new(&self.config.knowledge_base_dir, self.config.parse_options())
    }

    #[must_use]
    pub fn indexer(&self) -> Indexer {
        Indexer::new(
            self.index.clone(),
            self.embedder.clone(),
            self.config.splitter_config(),
            self.config.embed_batch_size,
        )
    }

    #[must_use]
    pub fn retriever(&self) -> Arc<dyn Retriever> {
        Arc::new(VectorIndexRetriever::new(
            self.index.clone(),
            self.embedder.clone(),
            self.config.query_mode(),
        ))
    }

    #[must_use]
    pub fn synthesizer(&self, retriever: Arc<dyn Retriever>) -> Synthesizer {
        Synthesizer::new(retriever, self.llm.clone(), self.config.synthesis_top_k)
    }

    #[must_use]
    pub fn app_state(&self) -> AppState {
        let retriever = self.retriever();
        AppState {
            synthesizer: Arc::new(self.synthesizer(retriever.clone())),
            retriever,
            search_top_k: self.config.search_top_k,
        }
    }
}
