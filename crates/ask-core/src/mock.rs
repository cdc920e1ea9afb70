//! Test-only backends.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embed::EmbeddingBackend;
use crate::llm::{ChatParams, LlmProvider, Message};
use crate::{AskError, Result};

type Responder = Box<dyn Fn(&[Message]) -> Result<String> + Send + Sync>;

/// A call starting or finishing, in the order observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Start,
    End,
}

/// Scripted chat provider that records calls and peak concurrency.
pub struct MockProvider {
    responder: Responder,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
    timeline: Mutex<Vec<CallEvent>>,
}

impl MockProvider {
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay_ms: 0,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            timeline: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::with_responder(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::with_responder(|_| Err(AskError::Llm("mock LLM error".into())))
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn timeline(&self) -> Vec<CallEvent> {
        self.timeline.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message], _params: ChatParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        self.timeline.lock().unwrap().push(CallEvent::Start);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.timeline.lock().unwrap().push(CallEvent::End);
        (self.responder)(messages)
    }
}

/// Deterministic embedder.
///
/// With keywords, component `i` counts occurrences of keyword `i` in the
/// lowercased text. Without, the vector is derived from a hash of the text.
pub struct MockEmbedder {
    dimension: usize,
    keywords: Vec<String>,
    fail_on: Option<String>,
    dimension_override: Option<(String, usize)>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            keywords: Vec::new(),
            fail_on: None,
            dimension_override: None,
        }
    }

    pub fn with_keywords(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            ..Self::new(keywords.len())
        }
    }

    /// Fail for any text containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Return a `dimension`-long vector for any text containing `needle`.
    pub fn with_dimension_for(mut self, needle: &str, dimension: usize) -> Self {
        self.dimension_override = Some((needle.to_string(), dimension));
        self
    }
}

impl EmbeddingBackend for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(AskError::Embedding(format!("mock failure on {}", needle)));
            }
        }

        let dimension = match &self.dimension_override {
            Some((needle, dim)) if text.contains(needle.as_str()) => *dim,
            _ => self.dimension,
        };

        if !self.keywords.is_empty() {
            let lower = text.to_lowercase();
            return Ok(self
                .keywords
                .iter()
                .map(|k| lower.matches(k.as_str()).count() as f32)
                .collect());
        }

        let hash = blake3::hash(text.as_bytes());
        let bytes = hash.as_bytes();
        Ok((0..dimension)
            .map(|i| f32::from(bytes[i % bytes.len()]) / 255.0 - 0.5)
            .collect())
    }
}
