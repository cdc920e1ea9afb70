//! LLM reranking of coarse candidates
//!
//! Each candidate is scored 0-10 by the model. Calls run in batches of
//! [`RERANK_CONCURRENCY`]; a batch finishes before the next one starts.
//! A bad response or a failed call scores 0 and never aborts the batch.

use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;
use serde_json::Value;

use crate::chunk::IndexedChunk;
use crate::llm::{ChatParams, LlmProvider, Message};
use crate::retrieve::RetrievalResult;
use crate::RERANK_CONCURRENCY;

pub const PARSE_FAILED_REASON: &str = "parse failed";
pub const SCORING_ERROR_REASON: &str = "scoring error";

const SCORING_PARAMS: ChatParams = ChatParams {
    temperature: 0.0,
    max_tokens: Some(100),
};

static FIRST_INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// A candidate with its model-assigned relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    pub chunk: IndexedChunk,
    /// 0 to 10
    pub relevance_score: f32,
    pub reason: Option<String>,
}

/// Build the scoring prompt for one candidate.
pub fn build_prompt(query: &str, chunk: &IndexedChunk) -> String {
    let c = &chunk.chunk;
    format!(
        r#"You are an expert at judging how relevant a piece of code is to a question.

## Question
{query}

## Code
File: {path}
Kind: {kind}
Lines: {start}-{end}

```{lang}
{content}
```

## Scoring
Rate the relevance from 0 to 10:
- 0-2: unrelated
- 3-4: loosely related, not a direct answer
- 5-6: partly useful
- 7-8: answers part of the question directly
- 9-10: the core code for answering the question

Reply with exactly this JSON and nothing else:
{{"score": <score>, "reason": "<short reason>"}}"#,
        query = query,
        path = c.file_path,
        kind = c.describe(),
        start = c.start_line,
        end = c.end_line,
        lang = c.fence_language(),
        content = c.content,
    )
}

fn clamp_score(score: f64) -> f32 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 10.0) as f32
}

/// Parse a scoring reply into `(score, reason)`.
///
/// Strict JSON first: an object whose `score` is a number or a numeric
/// string. Anything else falls back to the first integer in the text (0 if
/// there is none) with reason [`PARSE_FAILED_REASON`].
pub fn parse_score_response(content: &str) -> (f32, Option<String>) {
    if let Some((score, reason)) = parse_strict(content) {
        return (clamp_score(score), reason);
    }

    let score = FIRST_INTEGER_RE
        .find(content)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);
    (clamp_score(score), Some(PARSE_FAILED_REASON.to_string()))
}

fn parse_strict(content: &str) -> Option<(f64, Option<String>)> {
    let value = serde_json::from_str::<Value>(content).ok()?;
    let object = value.as_object()?;

    let score = match object.get("score")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let reason = match object.get("reason") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::String(_)) | Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };
    Some((score, reason))
}

async fn score_chunk<P: LlmProvider>(provider: &P, query: &str, chunk: &IndexedChunk) -> RerankResult {
    let messages = [Message::user(build_prompt(query, chunk))];

    match provider.chat(&messages, SCORING_PARAMS).await {
        Ok(content) => {
            let (relevance_score, reason) = parse_score_response(&content);
            if reason.as_deref() == Some(PARSE_FAILED_REASON) {
                tracing::warn!(
                    "Unparsable score for {}:{}, using {}",
                    chunk.chunk.file_path,
                    chunk.chunk.start_line,
                    relevance_score
                );
            }
            RerankResult {
                chunk: chunk.clone(),
                relevance_score,
                reason,
            }
        }
        Err(e) => {
            tracing::warn!("Scoring failed for {}: {}", chunk.chunk.file_path, e);
            RerankResult {
                chunk: chunk.clone(),
                relevance_score: 0.0,
                reason: Some(SCORING_ERROR_REASON.to_string()),
            }
        }
    }
}

/// Scores candidates through an [`LlmProvider`].
pub struct Reranker<'a, P> {
    provider: &'a P,
}

impl<'a, P: LlmProvider> Reranker<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Score `candidates` against `query` and keep the best `top_k`.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalResult],
        top_k: usize,
    ) -> Vec<RerankResult> {
        tracing::info!("Reranking {} candidates", candidates.len());

        let mut results = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(RERANK_CONCURRENCY) {
            let scored =
                join_all(batch.iter().map(|c| score_chunk(self.provider, query, &c.chunk))).await;
            results.extend(scored);
        }

        // sort_by is stable: equal scores keep candidate order
        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(top_k);

        tracing::info!(
            "Rerank kept {}: scores {:?}",
            results.len(),
            results.iter().map(|r| r.relevance_score).collect::<Vec<_>>()
        );
        results
    }
}
