//! ask-core: Question answering over a local code index
//!
//! This library splits a source tree into chunks, embeds them into a single
//! versioned JSON index, and answers questions with a two-stage retrieval
//! (vector recall, then LLM reranking) followed by grounded generation.

pub mod chunk;
pub mod config;
pub mod consts;
pub mod discover;
pub mod embed;
pub mod generate;
pub mod index;
pub mod llm;
pub mod loader;
pub mod rerank;
pub mod retrieve;
pub mod search;
pub mod splitter;
pub mod store;

#[cfg(test)]
pub(crate) mod mock;

pub use chunk::{ChunkKind, CodeChunk, IndexedChunk};
pub use config::Config;
pub use consts::*;
pub use discover::find_ask_root;
pub use embed::{EmbeddingBackend, FastEmbedBackend};
pub use index::Indexer;
pub use llm::{LlmProvider, OpenAiProvider};
pub use search::{Answer, Citation, Searcher};
pub use store::VectorStore;

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("Not in an ask repository (no .ask folder found)")]
    NotInRepo,

    #[error("Already initialized: {0}")]
    AlreadyInitialized(std::path::PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cannot read root directory {path}: {source}")]
    RootUnreadable {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No usable index at {0} (missing or built by another version). Run 'ask build' first.")]
    IndexMissing(std::path::PathBuf),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding failed for chunk {chunk_id} ({path}): {message}")]
    ChunkEmbedding {
        chunk_id: String,
        path: String,
        message: String,
    },

    #[error("Dimension mismatch for chunk {chunk_id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        chunk_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AskError>;
