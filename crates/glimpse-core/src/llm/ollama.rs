//! Ollama caption backend.
//!
//! Talks to a local or remote Ollama server via `/api/generate`. Text-only
//! models receive no `images` field.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{CaptionRequest, LlmProvider, LlmResponse};
use crate::error::PipelineError;

pub struct OllamaProvider {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, request: &CaptionRequest) -> Result<LlmResponse, PipelineError> {
        let url = format!("{}/api/generate", self.endpoint);
        let start = Instant::now();

        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            images: request.image.iter().map(|i| i.data.as_str()).collect(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Llm {
                message: format!("Ollama request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Llm {
                message: format!("Ollama HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| PipelineError::Llm {
            message: format!("Failed to parse Ollama response: {e}"),
            status_code: None,
        })?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::Llm {
                message: "Ollama returned an empty caption".to_string(),
                status_code: None,
            });
        }

        let tokens_used = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
        };

        Ok(LlmResponse {
            text,
            model: self.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ImageInput;
    use crate::test_support::serve_http;

    #[tokio::test]
    async fn test_generate_parses_caption() {
        let body = br#"{"response":"  Vista del puerto al atardecer. ","prompt_eval_count":40,"eval_count":9}"#;
        let base = serve_http(vec![(200, body.to_vec())]).await;
        let provider = OllamaProvider::new(&base, "llava", Duration::from_secs(5));

        let request = CaptionRequest::for_image(
            "Puerto",
            None,
            Some(ImageInput::from_bytes(&[1, 2, 3], "png")),
        );
        let resp = provider.generate(&request).await.unwrap();
        assert_eq!(resp.text, "Vista del puerto al atardecer.");
        assert_eq!(resp.model, "llava");
        assert_eq!(resp.tokens_used, Some(49));
    }

    #[tokio::test]
    async fn test_http_error_carries_status() {
        let base = serve_http(vec![(503, b"busy".to_vec())]).await;
        let provider = OllamaProvider::new(&base, "mistral", Duration::from_secs(5));
        let err = provider
            .generate(&CaptionRequest::for_image("Puerto", None, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Llm {
                status_code: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_caption_is_error() {
        let base = serve_http(vec![(200, br#"{"response":"   "}"#.to_vec())]).await;
        let provider = OllamaProvider::new(&base, "mistral", Duration::from_secs(5));
        let result = provider
            .generate(&CaptionRequest::for_image("Puerto", None, None))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_is_available() {
        let base = serve_http(vec![(200, br#"{"models":[]}"#.to_vec())]).await;
        let provider = OllamaProvider::new(&base, "llava", Duration::from_secs(5));
        assert!(provider.is_available().await);

        let down = OllamaProvider::new("http://127.0.0.1:9", "llava", Duration::from_secs(5));
        assert!(!down.is_available().await);
    }

    #[test]
    fn test_text_only_request_omits_images() {
        let body = GenerateRequest {
            model: "mistral",
            prompt: "hola",
            images: Vec::new(),
            stream: false,
            options: GenerateOptions {
                temperature: 0.2,
                num_predict: 10,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["stream"], false);
    }
}
