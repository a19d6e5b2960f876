//! Text-generation providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::types::{count_tokens, GenerationRequest, GenerationResponse, LlmError, Message, Usage};
use crate::config::{LlmConfig, ProviderKind};

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;

    fn name(&self) -> &str;
}

/// Build the provider named by the configuration, wrapped in retries.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn TextProvider>, LlmError> {
    let inner: Arc<dyn TextProvider> = match config.provider {
        ProviderKind::Mock => Arc::new(MockProvider::default()),
        ProviderKind::Local => Arc::new(LocalModelProvider::new(config.model.clone())),
        ProviderKind::Http => Arc::new(HttpProvider::new(config)?),
    };
    debug!(provider = config.provider.as_str(), model = %config.model, "text provider ready");
    Ok(Arc::new(super::RetryingProvider::new(
        inner,
        config.max_retries,
        config.timeout(),
    )))
}

/// OpenAI-compatible chat-completions client.
pub struct HttpProvider {
    endpoint: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.endpoint.is_empty() {
            return Err(LlmError::Config("HTTP provider needs an endpoint".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_seconds: config.timeout_seconds,
            client,
        })
    }
}

#[async_trait]
impl TextProvider for HttpProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [Message],
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            max_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
            #[serde(default)]
            usage: Option<ChatUsage>,
            model: String,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: Message,
            finish_reason: Option<String>,
        }

        #[derive(Deserialize)]
        struct ChatUsage {
            prompt_tokens: u32,
            completion_tokens: u32,
        }

        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_seconds)
            } else {
                LlmError::Network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Auth(format!("provider returned {}", status)));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::Api(format!("provider returned {}: {}", status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("failed to parse response: {}", e)))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Api("no choices in response".to_string()))?;

        Ok(GenerationResponse {
            content: choice.message.content,
            model: parsed.model,
            usage: parsed
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
            finish_reason: choice.finish_reason,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Offline stand-in for a locally hosted model. Output is derived from the
/// prompt so it is stable across runs.
#[derive(Debug, Clone)]
pub struct LocalModelProvider {
    model: String,
}

impl LocalModelProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextProvider for LocalModelProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let prompt = request.last_user_text();
        let focus = prompt
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty() && !line.starts_with("##"))
            .unwrap_or("the moment");
        let content = format!("[{}] The scene unfolds: {}", self.model, focus.trim());
        Ok(GenerationResponse {
            usage: Some(Usage::new(count_tokens(prompt), count_tokens(&content))),
            content,
            model: self.model.clone(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Deterministic provider answering from a keyword table.
#[derive(Debug, Clone)]
pub struct MockProvider {
    table: Vec<(Vec<String>, String)>,
    fallback: String,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("The world holds its breath, waiting for your next move.")
            .with_reply(&["你好", "hello", "greetings"], "Hello, traveler! Welcome to our humble town.")
            .with_reply(&["谢谢", "thank"], "You're most welcome, friend.")
            .with_reply(&["攻击", "attack", "fight"], "Steel rings out and the room falls silent.")
            .with_reply(&["帮助", "帮忙", "help"], "I'll see what I can do.")
    }
}

impl MockProvider {
    /// Empty table with a fallback reply.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            table: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Add a row. Rows are checked in insertion order.
    pub fn with_reply(mut self, keywords: &[&str], reply: impl Into<String>) -> Self {
        self.table
            .push((keywords.iter().map(|k| k.to_lowercase()).collect(), reply.into()));
        self
    }

    fn reply_for(&self, prompt: &str) -> &str {
        let lowered = prompt.to_lowercase();
        self.table
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(_, reply)| reply.as_str())
            .unwrap_or(self.fallback.as_str())
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let prompt = request.last_user_text();
        let content = self.reply_for(prompt).to_string();
        Ok(GenerationResponse {
            usage: Some(Usage::new(count_tokens(prompt), count_tokens(&content))),
            content,
            model: "mock".to_string(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_keyword_table() {
        let mock = MockProvider::default();
        let reply = mock
            .complete(GenerationRequest::from_prompt("mock", "Well, THANK you kindly"))
            .await
            .unwrap();
        assert_eq!(reply.content, "You're most welcome, friend.");
        assert_eq!(reply.usage.unwrap().prompt_tokens, 4);

        let reply = mock
            .complete(GenerationRequest::from_prompt("mock", "..."))
            .await
            .unwrap();
        assert!(reply.content.starts_with("The world holds its breath"));
    }

    #[tokio::test]
    async fn test_mock_first_row_wins() {
        let mock = MockProvider::new("?")
            .with_reply(&["a"], "first")
            .with_reply(&["a"], "second");
        let reply = mock.complete(GenerationRequest::from_prompt("m", "a")).await.unwrap();
        assert_eq!(reply.content, "first");
    }

    #[tokio::test]
    async fn test_local_model_is_deterministic() {
        let local = LocalModelProvider::new("tiny");
        let request = GenerationRequest::from_prompt("tiny", "## Task\nDescribe the tavern.\n");
        let a = local.complete(request.clone()).await.unwrap();
        let b = local.complete(request).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.content, "[tiny] The scene unfolds: Describe the tavern.");
    }

    #[test]
    fn test_http_provider_requires_endpoint() {
        let config = LlmConfig {
            provider: ProviderKind::Http,
            endpoint: String::new(),
            ..Default::default()
        };
        assert!(matches!(HttpProvider::new(&config), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_build_provider_by_kind() {
        let provider = build_provider(&LlmConfig::default()).unwrap();
        assert_eq!(provider.name(), "mock");
        let local = build_provider(&LlmConfig {
            provider: ProviderKind::Local,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(local.name(), "local");
    }
}
