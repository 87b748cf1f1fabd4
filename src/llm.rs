use async_trait::async_trait;
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::AiError;
use crate::prompts::BuiltPrompt;

/// Anything that can answer a rendered prompt with raw text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &BuiltPrompt) -> Result<String, AiError>;
}

#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f64,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl LlmClient {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, String> {
        let Some(api_key) = config.api_key.clone().filter(|key| !key.trim().is_empty()) else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| format!("failed to build AI client: {}", err))?;
        Ok(Some(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|err| AiError::from_reqwest(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| AiError::InvalidResponse(format!("AI response parse failed: {}", err)))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidResponse("AI response missing choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(AiError::ContentRejected(
                "AI provider rejected the content".to_string(),
            ));
        }

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, prompt: &BuiltPrompt) -> Result<String, AiError> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.send_once(&request).await {
                Ok(text) => {
                    debug!(prompt = prompt.kind.label(), attempt, "AI completion received");
                    return Ok(text);
                }
                Err(err) => {
                    if attempt > self.max_retries || !err.is_retryable() {
                        return Err(err);
                    }
                    let delay = backoff_delay(self.initial_backoff, self.max_backoff, attempt - 1);
                    warn!(
                        prompt = prompt.kind.label(),
                        attempt,
                        kind = err.kind().label(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "AI request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Exponential backoff capped at `max`, plus up to 25% random jitter.
pub fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let multiplier = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(multiplier);
    let capped_ms = base_ms.min(max.as_millis()) as u64;
    let jitter_cap = (capped_ms / 4).max(1);
    let jitter_ms = rand::thread_rng().gen_range(0..=jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
