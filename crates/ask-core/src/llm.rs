//! Chat-completion boundary used for reranking and answer generation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::{AskError, Result};

const BASE_BACKOFF_SECS: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling settings for one call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChatParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the model and return the assistant text.
    fn chat(
        &self,
        messages: &[Message],
        params: ChatParams,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .user_agent(concat!("ask/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model,
            max_retries,
        })
    }

    /// Build a provider from config, reading the API key from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            config.api_key()?,
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    /// POST the request, retrying on HTTP 429, timeouts and connection errors.
    async fn send_with_retry(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        for attempt in 0..=self.max_retries {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            let delay = match result {
                Ok(response) if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    return Ok(response);
                }
                Ok(response) => {
                    if attempt == self.max_retries {
                        break;
                    }
                    let delay = retry_delay(response.headers(), attempt);
                    tracing::warn!(
                        "Rate limited, retrying in {}s ({}/{})",
                        delay.as_secs(),
                        attempt + 1,
                        self.max_retries
                    );
                    delay
                }
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    let delay = backoff(attempt);
                    tracing::warn!(
                        "Request failed ({}), retrying in {}s ({}/{})",
                        e,
                        delay.as_secs(),
                        attempt + 1,
                        self.max_retries
                    );
                    delay
                }
                Err(e) => return Err(e.into()),
            };

            tokio::time::sleep(delay).await;
        }

        Err(AskError::Llm("rate limited".to_string()))
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(BASE_BACKOFF_SECS << attempt.min(6))
}

/// `Retry-After` seconds if present, otherwise exponential backoff.
fn retry_delay(headers: &reqwest::header::HeaderMap, attempt: u32) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| backoff(attempt))
}

fn parse_chat_response(text: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(text)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AskError::Llm("empty response".to_string()))
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message], params: ChatParams) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self.send_with_retry(&body).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("Chat API error {}: {}", status, text);
            return Err(AskError::Llm(format!("request failed (status {})", status)));
        }

        tracing::debug!(model = %self.model, bytes = text.len(), "chat completion received");
        parse_chat_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_request_body_shape() {
        let messages = [Message::system("be brief"), Message::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.0,
            max_tokens: Some(100),
        };
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["max_tokens"], 100);

        let no_limit = ChatRequest {
            max_tokens: None,
            ..body
        };
        assert!(serde_json::to_value(&no_limit).unwrap().get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_chat_response() {
        let text = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"42"}}]}"#;
        assert_eq!(parse_chat_response(text).unwrap(), "42");

        let empty = r#"{"choices":[]}"#;
        assert!(matches!(parse_chat_response(empty), Err(AskError::Llm(_))));

        let null_content = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(parse_chat_response(null_content).is_err());

        assert!(matches!(parse_chat_response("oops"), Err(AskError::Json(_))));
    }

    #[test]
    fn test_retry_delay() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_delay(&headers, 0), Duration::from_secs(1));
        assert_eq!(retry_delay(&headers, 2), Duration::from_secs(4));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_delay(&headers, 2), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        tokio::spawn({
            let accepted = Arc::clone(&accepted);
            async move {
                let mut open = Vec::new();
                while let Ok((socket, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    open.push(socket);
                }
            }
        });

        let provider = OpenAiProvider::new(
            "key".into(),
            format!("http://{}/v1", addr),
            "m".into(),
            Duration::from_millis(200),
            1,
        )
        .unwrap();
        let params = ChatParams {
            temperature: 0.0,
            max_tokens: None,
        };

        let result = provider.chat(&[Message::user("hi")], params).await;

        assert!(matches!(result, Err(AskError::Http(ref e)) if e.is_timeout()));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = OpenAiProvider::new(
            "key".into(),
            "http://localhost:1234/v1//".into(),
            "m".into(),
            Duration::from_secs(5),
            0,
        )
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
        assert!(!format!("{:?}", provider).contains("\"key\""));
    }
}
