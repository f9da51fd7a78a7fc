//! Caption backend trait, request/response types, and the factory that maps a
//! model selector to its configured backend.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::{resolve_env_var, CaptionBackendConfig, Config, ModelsConfig};
use crate::error::PipelineError;
use crate::pipeline::decode::format_to_string;
use crate::pipeline::LoadedImage;

/// Caption model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionModel {
    /// LLaMA-2 chat (text only)
    #[serde(rename = "LLM")]
    Llm,
    /// Mistral instruct (text only)
    #[serde(rename = "MISTRAL")]
    Mistral,
    /// LLaVA vision-language model
    #[serde(rename = "LLaVA")]
    Llava,
}

impl CaptionModel {
    pub const ALL: [CaptionModel; 3] = [CaptionModel::Llm, CaptionModel::Mistral, CaptionModel::Llava];

    /// Whether the model receives the image itself.
    pub fn accepts_images(self) -> bool {
        matches!(self, CaptionModel::Llava)
    }

    /// Backend settings for this model.
    pub fn backend_config(self, models: &ModelsConfig) -> &CaptionBackendConfig {
        match self {
            CaptionModel::Llm => &models.llm,
            CaptionModel::Mistral => &models.mistral,
            CaptionModel::Llava => &models.llava,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptionModel::Llm => "LLM",
            CaptionModel::Mistral => "MISTRAL",
            CaptionModel::Llava => "LLaVA",
        }
    }
}

impl fmt::Display for CaptionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionModel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LLM" | "LLAMA" | "LLAMA2" => Ok(CaptionModel::Llm),
            "MISTRAL" => Ok(CaptionModel::Mistral),
            "LLAVA" => Ok(CaptionModel::Llava),
            other => Err(PipelineError::Llm {
                message: format!("Unknown caption model: {other} (expected LLM, MISTRAL, or LLaVA)"),
                status_code: None,
            }),
        }
    }
}

/// Base64-encoded image ready to send to a caption backend.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type ("image/jpeg" or "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Encode a loaded image.
    ///
    /// JPEG and PNG bytes are sent as-is; other formats are re-encoded as PNG
    /// from the decoded pixels, since not every backend reads BMP, GIF, or TIFF.
    pub fn from_loaded(image: &LoadedImage) -> Result<Self, PipelineError> {
        let format = format_to_string(image.decoded.format);
        match format.as_str() {
            "jpeg" | "png" => Ok(Self::from_bytes(&image.bytes, &format)),
            _ => {
                let mut buf = std::io::Cursor::new(Vec::new());
                image
                    .decoded
                    .image
                    .write_to(&mut buf, image::ImageFormat::Png)
                    .map_err(|e| PipelineError::Decode {
                        path: image.source.label().into(),
                        message: format!("Failed to re-encode {format} as PNG: {e}"),
                    })?;
                Ok(Self::from_bytes(buf.get_ref(), "png"))
            }
        }
    }

    /// Wrap raw bytes of a known format.
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format {
            "png" => "image/png",
            "jpeg" | "jpg" => "image/jpeg",
            other => {
                tracing::warn!("Unexpected image format '{other}', labelling as image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A caption generation request.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// The image, for vision-language models
    pub image: Option<ImageInput>,
    /// Text prompt for the model
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl CaptionRequest {
    /// Build a caption prompt from the image title and optional context.
    ///
    /// The context paragraph is included only when present. Without an image
    /// the model is asked to caption from the title and context alone.
    pub fn for_image(title: &str, context: Option<&str>, image: Option<ImageInput>) -> Self {
        let mut prompt = if image.is_some() {
            format!(
                "Write a caption for this image in one or two sentences. \
                 The image is titled \"{title}\". Describe what is visible."
            )
        } else {
            format!(
                "Write a caption in one or two sentences for a photograph titled \"{title}\". \
                 Do not invent details that the title and background do not support."
            )
        };
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            prompt.push_str(&format!("\nBackground: {context}"));
        }
        prompt.push_str("\nReply with the caption only.");

        Self {
            image,
            prompt,
            max_tokens: 200,
            temperature: 0.2,
        }
    }

    /// Use the backend's sampling settings.
    pub fn with_sampling(mut self, backend: &CaptionBackendConfig) -> Self {
        self.max_tokens = backend.max_tokens;
        self.temperature = backend.temperature;
        self
    }
}

/// The response from a caption backend.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated caption
    pub text: String,
    /// Model identifier reported by the backend
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all caption backends implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Box<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name for logging (e.g., "ollama", "huggingface").
    fn name(&self) -> &str;

    /// Check whether the backend is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Generate a caption for the given request.
    async fn generate(&self, request: &CaptionRequest) -> Result<LlmResponse, PipelineError>;

    /// Per-request timeout for this backend.
    fn timeout(&self) -> Duration;
}

/// Creates the backend configured for a caption model.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create the backend for `model` from `models.<model>.backend`.
    ///
    /// - `ollama`: local server at `endpoint`, no key
    /// - `openai`: OpenAI-compatible server at `endpoint`, key from `api_key`
    /// - `huggingface`: hub inference router, authenticated with the hub token
    pub fn create(
        model: CaptionModel,
        config: &Config,
    ) -> Result<Box<dyn LlmProvider>, PipelineError> {
        let cfg = model.backend_config(&config.models);
        let timeout = Duration::from_millis(config.limits.llm_timeout_ms);

        match cfg.backend.to_lowercase().as_str() {
            "ollama" => Ok(Box::new(super::ollama::OllamaProvider::new(
                &cfg.endpoint,
                &cfg.model,
                timeout,
            ))),
            "openai" => {
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| PipelineError::Llm {
                    message: format!(
                        "API key for {model} not set. Set models.{}.api_key.",
                        model.as_str().to_lowercase()
                    ),
                    status_code: None,
                })?;
                Ok(Box::new(super::openai::OpenAiProvider::new(
                    &cfg.endpoint,
                    &api_key,
                    &cfg.model,
                    timeout,
                )))
            }
            "huggingface" | "hf" => {
                let token = resolve_env_var(&cfg.api_key)
                    .or_else(|| config.hub_token())
                    .ok_or_else(|| PipelineError::Auth {
                        message: "Hub token not set. Set defaults.token or HF_TOKEN.".to_string(),
                    })?;
                Ok(Box::new(super::huggingface::HuggingFaceProvider::new(
                    &config.models.hub.router_endpoint,
                    &token,
                    &cfg.model,
                    timeout,
                )))
            }
            other => Err(PipelineError::Llm {
                message: format!("Unknown caption backend: {other}"),
                status_code: None,
            }),
        }
    }
}
