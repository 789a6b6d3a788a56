//! Ingestion side: markdown parsing, document building, loading, chunking
//! and the pipeline that writes embedded nodes to the vector index.
pub mod core;
pub mod document;
pub mod loader;
pub mod markdown;
pub mod splitter;

pub use self::core::{Indexer, IngestReport};
pub use loader::{KnowledgeBase, KnowledgeBaseLoader};
