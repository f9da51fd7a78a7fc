//! OpenAI-compatible caption backend using the Chat Completions API.
//!
//! The image, when present, is sent as a data URL ahead of the prompt in the
//! user message content array.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{CaptionRequest, LlmProvider, LlmResponse};
use crate::error::PipelineError;

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// `endpoint` is the API base (e.g. `https://api.openai.com/v1`).
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

fn chat_content(request: &CaptionRequest) -> Vec<ChatContent> {
    let mut content = Vec::with_capacity(2);
    if let Some(image) = &request.image {
        content.push(ChatContent::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        });
    }
    content.push(ChatContent::Text {
        text: request.prompt.clone(),
    });
    content
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &CaptionRequest) -> Result<LlmResponse, PipelineError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: chat_content(request),
            }],
        };

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Llm {
                message: format!("Chat completion request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Llm {
                message: format!("Chat completion HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let chat: ChatResponse = resp.json().await.map_err(|e| PipelineError::Llm {
            message: format!("Failed to parse chat completion response: {e}"),
            status_code: None,
        })?;

        let text = chat
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::Llm {
                message: "Chat completion returned no caption".to_string(),
                status_code: None,
            })?
            .to_string();

        Ok(LlmResponse {
            text,
            model: chat.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: chat.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
