//! Query pipeline: embed the question, recall, rerank, generate

use std::path::Path;

use crate::embed::{EmbeddingBackend, Embedder};
use crate::generate::Generator;
use crate::llm::LlmProvider;
use crate::rerank::{RerankResult, Reranker};
use crate::retrieve::{self, RetrievalResult};
use crate::store::{self, VectorStore};
use crate::{AskError, Config, Result};

/// A chunk the answer was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Chunk name, or its kind when unnamed
    pub label: String,
    pub relevance_score: f32,
}

impl From<&RerankResult> for Citation {
    fn from(result: &RerankResult) -> Self {
        let chunk = &result.chunk.chunk;
        Self {
            path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            label: chunk.label().to_string(),
            relevance_score: result.relevance_score,
        }
    }
}

/// Generated answer with its citations, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Searcher for querying a built index.
pub struct Searcher<E> {
    store: VectorStore,
    embedder: Embedder<E>,
    top_n: usize,
    top_k: usize,
}

impl<E: EmbeddingBackend> Searcher<E> {
    /// Load the index of an ask repository.
    ///
    /// Fails with [`AskError::IndexMissing`] when there is no usable index.
    pub fn open(root: &Path, config: &Config, backend: E) -> Result<Self> {
        let index_path = config.index_path(root);
        let store = store::load_store(&index_path).ok_or(AskError::IndexMissing(index_path))?;

        Ok(Self {
            store,
            embedder: Embedder::new(backend),
            top_n: config.top_n,
            top_k: config.top_k,
        })
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Coarse recall only: the `limit` chunks most similar to `query`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalResult>> {
        let query_embedding = self.embedder.embed_query(query).await?;
        retrieve::retrieve(&query_embedding, &self.store.chunks, limit)
    }

    /// Answer `question` through recall, reranking and generation.
    pub async fn ask<P: LlmProvider>(&self, provider: &P, question: &str) -> Result<Answer> {
        let candidates = self.search(question, self.top_n).await?;
        let reranked = Reranker::new(provider)
            .rerank(question, &candidates, self.top_k)
            .await;
        let text = Generator::new(provider).generate(question, &reranked).await?;

        Ok(Answer {
            text,
            citations: reranked.iter().map(Citation::from).collect(),
        })
    }
}
