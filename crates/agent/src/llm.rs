use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use pricescout_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm is not configured: {0}")]
    NotConfigured(String),
    #[error("llm request timed out")]
    Timeout,
    #[error("llm network error: {0}")]
    Network(String),
    #[error("llm rate limited")]
    RateLimited,
    #[error("llm api returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("llm returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotConfigured(_) | Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq, OpenAI,
/// Ollama).
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
    base_delay: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::NotConfigured(format!("http client: {error}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim().trim_end_matches('/')),
            api_key,
            model: model.into(),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            temperature: 0.1,
            max_tokens: 4_000,
        })
    }

    /// Builds a client from configuration. Providers that need a key fail
    /// with [`LlmError::NotConfigured`] when none is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().filter(|key| !key.expose_secret().trim().is_empty());
        if config.provider.requires_api_key() && api_key.is_none() {
            return Err(LlmError::NotConfigured(format!(
                "llm.api_key is required for the {} provider",
                config.provider.as_str()
            )));
        }

        Ok(Self::new(
            config.effective_base_url(),
            api_key,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_retry(config.max_retries, Duration::from_secs(1)))
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Network(error.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body: truncate(&body, 200) });
        }

        let text = response.text().await.map_err(|error| LlmError::Network(error.to_string()))?;
        parse_completion(&text)
    }
}

#[async_trait]
impl LlmClient for ChatCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        info!(
            event_name = "llm.complete.started",
            model = %self.model,
            message_count = messages.len(),
            "requesting chat completion"
        );

        let mut attempt = 0;
        loop {
            match self.send_once(messages).await {
                Ok(content) => return Ok(content),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.base_delay, attempt);
                    attempt += 1;
                    warn!(
                        event_name = "llm.complete.retry",
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "chat completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// `base * 2^attempt`, capped at 30 seconds.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    base.saturating_mul(factor).min(Duration::from_secs(30))
}

fn parse_completion(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("completion had no content".to_string()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
