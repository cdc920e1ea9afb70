//! Embedding generation
//!
//! [`FastEmbedBackend`] runs a local fastembed model that is loaded at most
//! once per process. [`Embedder`] turns chunks into [`IndexedChunk`]s, one
//! backend call at a time.

use std::future::Future;
use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::OnceCell;

use crate::chunk::{CodeChunk, IndexedChunk};
use crate::{AskError, Result, EMBED_CHAR_LIMIT, PROGRESS_INTERVAL};

/// Maps text to a fixed-length vector.
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// The loaded model, shared by every [`FastEmbedBackend`] in the process.
struct LoadedModel {
    name: String,
    model: Arc<TextEmbedding>,
}

static MODEL: OnceCell<LoadedModel> = OnceCell::const_new();

/// Local embedding backend using fastembed.
#[derive(Debug, Clone)]
pub struct FastEmbedBackend {
    model_name: String,
}

impl FastEmbedBackend {
    /// Create a backend for a fastembed model. Nothing is loaded until the first call.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }

    /// Return the process-wide model, loading it on first use.
    async fn handle(&self) -> Result<Arc<TextEmbedding>> {
        let loaded = MODEL
            .get_or_try_init(|| load_model(self.model_name.clone()))
            .await?;

        if loaded.name != self.model_name {
            return Err(AskError::Embedding(format!(
                "model {} is already loaded; cannot switch to {} in the same process",
                loaded.name, self.model_name
            )));
        }

        Ok(Arc::clone(&loaded.model))
    }
}

fn model_type(name: &str) -> Result<EmbeddingModel> {
    match name {
        "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        // Code-optimized, larger download
        "jina-embeddings-v2-base-code" => Ok(EmbeddingModel::JinaEmbeddingsV2BaseCode),
        other => Err(AskError::Embedding(format!(
            "Unknown model: {}. Supported: all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, jina-embeddings-v2-base-code",
            other
        ))),
    }
}

async fn load_model(name: String) -> Result<LoadedModel> {
    let model_type = model_type(&name)?;
    tracing::info!("Loading embedding model {} (first run downloads it)", name);

    let model = tokio::task::spawn_blocking(move || {
        TextEmbedding::try_new(InitOptions::new(model_type).with_show_download_progress(true))
    })
    .await
    .map_err(|e| AskError::Embedding(e.to_string()))?
    .map_err(|e| AskError::Embedding(e.to_string()))?;

    tracing::info!("Embedding model {} loaded", name);
    Ok(LoadedModel {
        name,
        model: Arc::new(model),
    })
}

impl EmbeddingBackend for FastEmbedBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.handle().await?;
        let text = text.to_string();

        let embeddings = tokio::task::spawn_blocking(move || model.embed(vec![text], None))
            .await
            .map_err(|e| AskError::Embedding(e.to_string()))?
            .map_err(|e| AskError::Embedding(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AskError::Embedding("No embedding generated".to_string()))
    }
}

/// Text fed to the embedding model for a chunk: path, kind/name, then content.
pub fn prepare_text(chunk: &CodeChunk) -> String {
    let mut parts = vec![format!("File: {}", chunk.file_path)];
    if let Some(name) = &chunk.name {
        parts.push(format!("{}: {}", chunk.kind, name));
    }
    parts.push(chunk.content.clone());
    parts.join("\n")
}

/// Cut `text` to at most `limit` characters, on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Embeds chunks and queries through a backend.
pub struct Embedder<B> {
    backend: B,
}

impl<B: EmbeddingBackend> Embedder<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Embed every chunk, in order, one call at a time.
    ///
    /// `on_progress(done, total)` is called every [`PROGRESS_INTERVAL`] chunks
    /// and after the last one. Any failure aborts the whole batch.
    pub async fn embed_chunks<F>(
        &self,
        chunks: Vec<CodeChunk>,
        mut on_progress: F,
    ) -> Result<Vec<IndexedChunk>>
    where
        F: FnMut(usize, usize),
    {
        let total = chunks.len();
        let mut indexed = Vec::with_capacity(total);
        let mut dimension: Option<usize> = None;

        tracing::info!("Embedding {} chunks", total);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let text = prepare_text(&chunk);
            let embedding = self
                .backend
                .embed(truncate_chars(&text, EMBED_CHAR_LIMIT))
                .await
                .map_err(|e| AskError::ChunkEmbedding {
                    chunk_id: chunk.id.clone(),
                    path: chunk.file_path.clone(),
                    message: e.to_string(),
                })?;

            match dimension {
                None if embedding.is_empty() => {
                    return Err(AskError::ChunkEmbedding {
                        chunk_id: chunk.id.clone(),
                        path: chunk.file_path.clone(),
                        message: "backend returned an empty vector".to_string(),
                    });
                }
                None => dimension = Some(embedding.len()),
                Some(expected) if expected != embedding.len() => {
                    return Err(AskError::DimensionMismatch {
                        chunk_id: chunk.id.clone(),
                        expected,
                        actual: embedding.len(),
                    });
                }
                Some(_) => {}
            }

            indexed.push(IndexedChunk { chunk, embedding });

            let done = i + 1;
            if done % PROGRESS_INTERVAL == 0 || done == total {
                tracing::info!("Embedding progress: {}/{}", done, total);
                on_progress(done, total);
            }
        }

        Ok(indexed)
    }

    /// Embed a query string.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.backend
            .embed(truncate_chars(query, EMBED_CHAR_LIMIT))
            .await
    }
}
