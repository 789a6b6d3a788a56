use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::frontmatter;
use crate::indexer::document::build_documents;
use crate::indexer::markdown::{ParseOptions, parse_markdown};
use crate::models::Document;

/// A file that was left out of a load, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of walking a knowledge base.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    pub documents: Vec<Document>,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Walks a folder of markdown notes and turns every note into documents.
pub struct KnowledgeBaseLoader {
    root: PathBuf,
    options: ParseOptions,
}

impl KnowledgeBaseLoader {
    pub fn new<P: AsRef<Path>>(root: P, options: ParseOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks if a file extension marks a markdown note
    fn is_markdown(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
    }

    /// Loads every markdown file under the root, skipping hidden directories.
    ///
    /// Dot-files such as `.draft.md` are still loaded; only directories whose
    /// name starts with `.` (`.obsidian`, `.git`, `.trash`) are pruned.
    ///
    /// Files that cannot be read or whose frontmatter is malformed are logged
    /// and skipped; they do not abort the load.
    pub fn load(&self) -> Result<KnowledgeBase> {
        if !self.root.is_dir() {
            bail!(
                "knowledge base directory not found: {}",
                self.root.display()
            );
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| !is_hidden_dir(entry))
            .build();

        let mut kb = KnowledgeBase::default();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to walk knowledge base entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) || !Self::is_markdown(path) {
                continue;
            }

            match self.load_file(path) {
                Ok(documents) => {
                    debug!(
                        "Loaded {} documents from {}",
                        documents.len(),
                        path.display()
                    );
                    kb.documents.extend(documents);
                    kb.files_loaded += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {e:#}", path.display());
                    kb.skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            files = kb.files_loaded,
            skipped = kb.skipped.len(),
            documents = kb.documents.len(),
            "Loaded knowledge base from {}",
            self.root.display()
        );

        Ok(kb)
    }

    /// Parses a single note into documents.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let parsed = frontmatter::parse(&content)
            .with_context(|| format!("bad frontmatter in {}", path.display()))?;

        let sections = parse_markdown(&parsed.body, self.options);

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        // Keep ids stable across platforms.
        let relative_path = relative.to_string_lossy().replace('\\', "/");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.clone());

        Ok(build_documents(
            &relative_path,
            &file_name,
            sections,
            &parsed.fields,
        ))
    }
}

fn is_hidden_dir(entry: &ignore::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_some_and(|t| t.is_dir())
        && entry.file_name().to_string_lossy().starts_with('.')
}
