//! Grounded answer generation from reranked chunks

use crate::llm::{ChatParams, LlmProvider, Message};
use crate::rerank::RerankResult;
use crate::{Result, INSUFFICIENT_CONTEXT};

const ANSWER_PARAMS: ChatParams = ChatParams {
    temperature: 0.3,
    max_tokens: None,
};

/// Render one section per result: location, kind, relevance and fenced code.
pub fn build_context(results: &[RerankResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let c = &r.chunk.chunk;
            format!(
                "### Snippet {}\nFile: {}\nKind: {}\nLines: {}-{}\nRelevance: {}/10\n\n```{}\n{}\n```",
                i + 1,
                c.file_path,
                c.describe(),
                c.start_line,
                c.end_line,
                r.relevance_score,
                c.fence_language(),
                c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_system_prompt(context: &str) -> String {
    format!(
        r#"You are an expert assistant for this codebase. The user asks questions about the code; answer them from the snippets below.

## Rules
1. Answer only from the provided snippets. Never invent code that is not shown.
2. If the snippets are not enough to answer, say so plainly.
3. When referring to code, cite the file path and line numbers.
4. Be concise, accurate and well organized.

## Relevant snippets
{}"#,
        context
    )
}

/// Produces answers through an [`LlmProvider`].
pub struct Generator<'a, P> {
    provider: &'a P,
}

impl<'a, P: LlmProvider> Generator<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Answer `query` from `results`.
    ///
    /// With no results the fixed [`INSUFFICIENT_CONTEXT`] answer is returned
    /// and the provider is not called.
    pub async fn generate(&self, query: &str, results: &[RerankResult]) -> Result<String> {
        if results.is_empty() {
            tracing::info!("No context for generation");
            return Ok(INSUFFICIENT_CONTEXT.to_string());
        }

        let messages = [
            Message::system(build_system_prompt(&build_context(results))),
            Message::user(query),
        ];

        tracing::info!("Generating answer from {} snippets", results.len());
        let answer = self.provider.chat(&messages, ANSWER_PARAMS).await?;
        tracing::debug!("Answer generated ({} chars)", answer.len());

        Ok(answer)
    }
}
