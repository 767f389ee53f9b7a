//! Text model seam and the OpenRouter chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use quizsmith_shared::{OpenRouterConfig, QuizsmithError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// A language model that turns one prompt into raw response text.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Run the prompt. Transport and provider failures are
    /// [`QuizsmithError::Generation`].
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// OpenRouter
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat-completions client pointed at OpenRouter.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuizsmithError::Generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.default_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Value,
}

#[async_trait]
impl TextModel for OpenRouterClient {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        debug!(prompt_chars = prompt.len(), "sending completion request");

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| QuizsmithError::Generation(format!("request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(QuizsmithError::Generation(format!(
                "provider returned HTTP {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let body: ChatResponse = res
            .json()
            .await
            .map_err(|e| QuizsmithError::Generation(format!("unreadable provider response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| message_text(&c.message.content))
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(QuizsmithError::Generation(
                "provider returned an empty completion".into(),
            ));
        }

        debug!(response_chars = content.len(), "completion received");
        Ok(content)
    }
}

/// Message content is either a plain string or a list of typed parts.
fn message_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect(),
        _ => String::new(),
    }
}
