//! # notes-rag: Markdown notes RAG service
//!
//! Ingests a folder of markdown notes into a Pinecone index using OpenAI
//! embeddings, then answers queries over HTTP by retrieving the closest
//! chunks and, optionally, synthesizing an answer with an OpenAI chat model.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration, validation, and environment secrets
//! - **[`frontmatter`]**: YAML front-matter extraction and flattening
//! - **[`indexer`]**: Markdown parsing, document building, loading, chunking, ingestion
//! - **[`embedder`]**: `Embedder` trait plus a deterministic mock
//! - **[`llm`]**: `CompletionModel` trait plus a scripted mock
//! - **[`openai`]**: OpenAI embeddings + chat completions client
//! - **[`vector_store`]**: `VectorIndex` trait, Pinecone client, in-memory index, MMR
//! - **[`retriever`]**: Query embedding + similarity search into scored matches
//! - **[`synthesizer`]**: Retrieval-grounded single-shot answers
//! - **[`server`]**: axum HTTP API (`/`, `/retrieval`, `/synthesis`)
//! - **[`context`]**: Shared clients wired once per process

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod context;
pub mod embedder;
pub mod frontmatter;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod openai;
pub mod retriever;
pub mod server;
pub mod synthesizer;
pub mod vector_store;

/// Boxed future used by the object-safe async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
