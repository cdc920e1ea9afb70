//! Coarse recall by cosine similarity

use crate::chunk::IndexedChunk;
use crate::{AskError, Result};

/// A chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: IndexedChunk,
    pub score: f32,
}

/// Cosine similarity of two equal-length vectors; 0 when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let magnitude = norm_a.sqrt() * norm_b.sqrt();
    if magnitude == 0.0 {
        return Some(0.0);
    }
    Some((dot / magnitude) as f32)
}

/// Score every chunk against `query` and keep the best `top_n`.
///
/// Ties keep their original order. A chunk whose embedding length differs
/// from the query's is an error: the index is stale or foreign.
pub fn retrieve(
    query: &[f32],
    chunks: &[IndexedChunk],
    top_n: usize,
) -> Result<Vec<RetrievalResult>> {
    let mut scored = chunks
        .iter()
        .map(|chunk| {
            let score = cosine_similarity(query, &chunk.embedding).ok_or_else(|| {
                AskError::DimensionMismatch {
                    chunk_id: chunk.chunk.id.clone(),
                    expected: query.len(),
                    actual: chunk.embedding.len(),
                }
            })?;
            Ok(RetrievalResult {
                chunk: chunk.clone(),
                score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // sort_by is stable
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);

    if let (Some(best), Some(worst)) = (scored.first(), scored.last()) {
        tracing::info!(
            "Retrieved top {} of {} chunks, similarity {:.4} ~ {:.4}",
            scored.len(),
            chunks.len(),
            worst.score,
            best.score
        );
    }

    Ok(scored)
}
