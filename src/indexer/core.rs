use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::embedder::Embedder;
use crate::indexer::loader::KnowledgeBaseLoader;
use crate::indexer::splitter::{SplitterConfig, split_documents};
use crate::vector_store::{IndexSpec, VectorIndex, ensure_index};

/// Outcome of one ingestion run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub documents: usize,
    pub nodes: usize,
    pub upserted: usize,
}

/// Loader -> chunker -> embedder -> index writer.
pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    splitter: SplitterConfig,
    batch_size: usize,
    show_progress: bool,
}

impl Indexer {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        splitter: SplitterConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            splitter,
            batch_size: batch_size.max(1),
            show_progress: false,
        }
    }

    /// Draw a progress bar over embedding batches on stderr.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} nodes {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Runs a full ingestion of the knowledge base into `spec`'s index.
    ///
    /// The index is created first if missing. Nodes are embedded in batches
    /// and each batch is upserted as soon as its vectors arrive.
    pub async fn ingest(
        &self,
        loader: &KnowledgeBaseLoader,
        spec: &IndexSpec,
    ) -> Result<IngestReport> {
        ensure!(
            self.embedder.dimensions() == spec.dimension,
            "embedder produces {}-dimensional vectors but index {} expects {}",
            self.embedder.dimensions(),
            spec.name,
            spec.dimension
        );

        let kb = loader.load()?;
        if kb.documents.is_empty() {
            warn!(root = %loader.root().display(), "Knowledge base has no documents");
        }

        let mut nodes = split_documents(&kb.documents, self.splitter);
        let mut report = IngestReport {
            files_loaded: kb.files_loaded,
            files_skipped: kb.skipped.len(),
            documents: kb.documents.len(),
            nodes: nodes.len(),
            upserted: 0,
        };
        info!(
            files = report.files_loaded,
            documents = report.documents,
            nodes = report.nodes,
            "Knowledge base chunked"
        );

        ensure_index(self.index.as_ref(), spec)
            .await
            .with_context(|| format!("failed to prepare index {}", spec.name))?;

        let pb = self.progress_bar(nodes.len() as u64);
        for batch in nodes.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|n| n.embedding_text()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .context("embedding request failed")?;
            ensure!(
                vectors.len() == batch.len(),
                "embedder returned {} vectors for {} nodes",
                vectors.len(),
                batch.len()
            );
            for (node, vector) in batch.iter_mut().zip(vectors) {
                node.embedding = Some(vector);
            }

            report.upserted += self
                .index
                .upsert(batch)
                .await
                .context("upsert failed")?;
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        info!(
            upserted = report.upserted,
            skipped = report.files_skipped,
            index = %spec.name,
            "Ingestion finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use crate::indexer::markdown::ParseOptions;
    use crate::vector_store::memory::InMemoryIndex;
    use crate::vector_store::{Metric, QueryMode, VectorQuery};
    use std::fs;
    use tempfile::tempdir;

    const DIM: usize = 32;

    fn spec() -> IndexSpec {
        IndexSpec {
            name: "notes".into(),
            dimension: DIM,
            metric: Metric::Euclidean,
            pod_type: "p1".into(),
        }
    }

    #[tokio::test]
    async fn test_ingest_counts_and_stores() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("Web3.md"), "# Intro\nWeb3 basics\n# DApps\nApps\n").unwrap();
        fs::write(root.join("plain.md"), "just text\n").unwrap();
        fs::write(root.join("broken.md"), "---\ntitle: [unclosed\n---\nbody\n").unwrap();

        let index = Arc::new(InMemoryIndex::new());
        let indexer = Indexer::new(
            index.clone(),
            Arc::new(MockEmbedder::new(DIM)),
            SplitterConfig::default(),
            2,
        );
        let loader = KnowledgeBaseLoader::new(root, ParseOptions::default());
        let report = indexer.ingest(&loader, &spec()).await.unwrap();

        assert_eq!(report.files_loaded, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.documents, 3);
        assert_eq!(report.nodes, 3);
        assert_eq!(report.upserted, 3);
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_twice_reuses_index() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.md"), "# A\nalpha\n").unwrap();

        let index = Arc::new(InMemoryIndex::new());
        let indexer = Indexer::new(
            index.clone(),
            Arc::new(MockEmbedder::new(DIM)),
            SplitterConfig::default(),
            8,
        );
        let loader = KnowledgeBaseLoader::new(temp_dir.path(), ParseOptions::default());
        indexer.ingest(&loader, &spec()).await.unwrap();
        indexer.ingest(&loader, &spec()).await.unwrap();
        assert_eq!(index.len(), 1, "re-ingesting upserts by id");
    }

    #[tokio::test]
    async fn test_ingested_nodes_are_queryable() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join("a.md"),
            "---\ntags: [web3]\n---\n# Intro\nalpha\n",
        )
        .unwrap();

        let index = Arc::new(InMemoryIndex::new());
        let embedder = Arc::new(MockEmbedder::new(DIM));
        let indexer = Indexer::new(index.clone(), embedder.clone(), SplitterConfig::default(), 8);
        let loader = KnowledgeBaseLoader::new(temp_dir.path(), ParseOptions::default());
        indexer.ingest(&loader, &spec()).await.unwrap();

        let query = VectorQuery {
            embedding: embedder.embed("anything").await.unwrap(),
            top_k: 5,
            mode: QueryMode::Default,
        };
        let result = index.query(&query).await.unwrap();
        assert_eq!(result.nodes.len(), 1);
        let node = &result.nodes[0];
        assert_eq!(node.id, "a.md#Intro|0");
        assert_eq!(node.ref_doc_id, "a.md#Intro");
        assert_eq!(node.metadata.get("tags").map(String::as_str), Some("web3"));
        assert_eq!(node.metadata.get("file_name").map(String::as_str), Some("a.md"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_before_loading() {
        let index = Arc::new(InMemoryIndex::new());
        let indexer = Indexer::new(
            index.clone(),
            Arc::new(MockEmbedder::new(DIM + 1)),
            SplitterConfig::default(),
            8,
        );
        let loader = KnowledgeBaseLoader::new("/definitely/not/here", ParseOptions::default());
        let err = indexer.ingest(&loader, &spec()).await.unwrap_err();
        assert!(err.to_string().contains("dimensional"));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let indexer = Indexer::new(
            Arc::new(InMemoryIndex::new()),
            Arc::new(MockEmbedder::new(DIM)),
            SplitterConfig::default(),
            8,
        );
        let loader = KnowledgeBaseLoader::new("/definitely/not/here", ParseOptions::default());
        assert!(indexer.ingest(&loader, &spec()).await.is_err());
    }
}
