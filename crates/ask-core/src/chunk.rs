//! Chunk records shared by every pipeline stage

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Heuristic classification of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Other,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous region of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    /// Derived from (file path, start line), see [`chunk_id`]
    pub id: String,
    /// Relative file path from the indexed root
    pub file_path: String,
    /// Trimmed chunk text
    pub content: String,
    /// Starting line number (1-indexed, inclusive)
    pub start_line: usize,
    /// Ending line number (1-indexed, inclusive)
    pub end_line: usize,
    pub kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CodeChunk {
    /// Name when present, otherwise the kind.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.kind.as_str(),
        }
    }

    /// `kind` or `kind (name)`, as shown in prompts.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", self.kind, name),
            None => self.kind.to_string(),
        }
    }

    /// Language tag for fenced code blocks, from the file extension.
    pub fn fence_language(&self) -> &str {
        Path::new(&self.file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    #[serde(flatten)]
    pub chunk: CodeChunk,
    pub embedding: Vec<f32>,
}

/// Stable chunk id: first 16 hex chars of blake3("path:start_line").
pub fn chunk_id(file_path: &str, start_line: usize) -> String {
    let hash = blake3::hash(format!("{}:{}", file_path, start_line).as_bytes());
    hash.to_hex()[..16].to_string()
}
