//! Model hub inference backend.
//!
//! The hub router speaks the OpenAI Chat Completions format, so this
//! delegates to `OpenAiProvider` authenticated with the hub token.

use std::time::Duration;

use async_trait::async_trait;

use super::openai::OpenAiProvider;
use super::provider::{CaptionRequest, LlmProvider, LlmResponse};
use crate::error::PipelineError;

pub struct HuggingFaceProvider {
    inner: OpenAiProvider,
}

impl HuggingFaceProvider {
    pub fn new(router_endpoint: &str, token: &str, model: &str, timeout: Duration) -> Self {
        Self {
            inner: OpenAiProvider::new(router_endpoint, token, model, timeout),
        }
    }
}

#[async_trait]
impl LlmProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn generate(&self, request: &CaptionRequest) -> Result<LlmResponse, PipelineError> {
        self.inner.generate(request).await
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }
}
