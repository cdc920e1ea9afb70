//! Versioned JSON vector store
//!
//! The whole index lives in one file that is rewritten on every build. A
//! file with another version, bad JSON or inconsistent vectors is treated
//! exactly like a missing one.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::IndexedChunk;
use crate::{Result, STORE_VERSION};

/// The persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStore {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

impl VectorStore {
    /// Embedding dimension, or `None` for an empty store.
    pub fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    fn is_consistent(&self) -> bool {
        match self.dimension() {
            Some(dim) => self.chunks.iter().all(|c| c.embedding.len() == dim),
            None => true,
        }
    }
}

/// Write `chunks` to `path` as a fresh store.
///
/// Parent directories are created. The file is written next to `path` and
/// renamed over it, so readers never see a half-written index.
pub fn save_store(chunks: &[IndexedChunk], path: &Path) -> Result<()> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct StoreRef<'a> {
        version: &'a str,
        created_at: DateTime<Utc>,
        chunks: &'a [IndexedChunk],
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(&StoreRef {
        version: STORE_VERSION,
        created_at: Utc::now(),
        chunks,
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;

    tracing::info!("Saved {} chunks to {}", chunks.len(), path.display());
    Ok(())
}

/// Load the store at `path`.
///
/// Returns `None` when the file is missing, unreadable, unparsable, from
/// another [`STORE_VERSION`], or mixes embedding dimensions.
pub fn load_store(path: &Path) -> Option<VectorStore> {
    if !path.exists() {
        tracing::info!("Index file not found: {}", path.display());
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read index {}: {}", path.display(), e);
            return None;
        }
    };

    let store: VectorStore = match serde_json::from_str(&content) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("Failed to parse index {}: {}", path.display(), e);
            return None;
        }
    };

    if store.version != STORE_VERSION {
        tracing::warn!(
            "Index version mismatch ({} vs {}), rebuild required",
            store.version,
            STORE_VERSION
        );
        return None;
    }

    if !store.is_consistent() {
        tracing::warn!("Index {} mixes embedding dimensions", path.display());
        return None;
    }

    tracing::info!(
        "Loaded {} chunks (created {})",
        store.chunks.len(),
        store.created_at.to_rfc3339()
    );
    Some(store)
}
