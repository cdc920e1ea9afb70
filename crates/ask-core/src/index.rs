//! Index build: load files, split into chunks, embed, write the store

use std::path::{Path, PathBuf};

use crate::embed::{EmbeddingBackend, Embedder};
use crate::{loader, splitter, store, Config, Result};

/// Progress events emitted during a build.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Walking the tree for matching files.
    Loading,
    /// Files read, splitting into chunks.
    Splitting { files: usize },
    /// Generating embeddings.
    Embedding { current: usize, total: usize },
    /// Writing the index file.
    Saving { chunks: usize },
}

/// Type alias for progress callback.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Stats from a build.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub files_loaded: usize,
    pub chunks_created: usize,
    /// `None` when nothing was indexed
    pub dimension: Option<usize>,
    pub index_path: PathBuf,
}

/// The indexer runs the build pipeline and replaces the index file.
pub struct Indexer<E> {
    root: PathBuf,
    config: Config,
    embedder: Embedder<E>,
    progress_callback: Option<ProgressCallback>,
}

impl<E: EmbeddingBackend> Indexer<E> {
    /// Create an indexer for an ask repository.
    pub fn new(root: PathBuf, config: Config, backend: E) -> Self {
        Self {
            root,
            config,
            embedder: Embedder::new(backend),
            progress_callback: None,
        }
    }

    /// Set a callback to receive progress updates during a build.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    /// Build the index from `path` (relative to the repository root), or
    /// from the whole root when `None`.
    ///
    /// The previous index is replaced only after every chunk is embedded;
    /// an embedding failure leaves it untouched.
    pub async fn build(&self, path: Option<&Path>) -> Result<IndexStats> {
        let start_path = match path {
            Some(p) => self.root.join(p),
            None => self.root.clone(),
        };

        self.emit_progress(ProgressEvent::Loading);
        let mut files = loader::load_files(
            &start_path,
            &self.config.include,
            &self.config.exclude,
            self.config.max_file_size,
        )?;

        // Keep file paths relative to the repository root
        if let Some(prefix) = path.filter(|p| !p.as_os_str().is_empty()) {
            for file in &mut files {
                file.relative_path = prefix
                    .join(&file.relative_path)
                    .to_string_lossy()
                    .into_owned();
            }
        }

        self.emit_progress(ProgressEvent::Splitting { files: files.len() });
        let chunks = splitter::split_files(&files);
        if chunks.is_empty() {
            tracing::warn!("No chunks produced from {}", start_path.display());
        }

        let indexed = self
            .embedder
            .embed_chunks(chunks, |current, total| {
                self.emit_progress(ProgressEvent::Embedding { current, total })
            })
            .await?;

        let index_path = self.config.index_path(&self.root);
        self.emit_progress(ProgressEvent::Saving {
            chunks: indexed.len(),
        });
        store::save_store(&indexed, &index_path)?;

        Ok(IndexStats {
            files_loaded: files.len(),
            chunks_created: indexed.len(),
            dimension: indexed.first().map(|c| c.embedding.len()),
            index_path,
        })
    }
}
