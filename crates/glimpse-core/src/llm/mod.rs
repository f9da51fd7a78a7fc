//! Caption generation backends and the APPLY-mode captioner.
//!
//! Three model selectors (LLM, MISTRAL, LLaVA) are each served by a
//! configurable backend:
//! - **ollama**: local or remote Ollama server
//! - **huggingface**: model hub inference router (OpenAI-compatible)
//! - **openai**: any OpenAI-compatible chat completions server

pub mod captioner;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod titles;

pub use captioner::{CaptionItem, CaptionOutcome, Captioner};
pub use provider::{
    CaptionModel, CaptionRequest, ImageInput, LlmProvider, LlmProviderFactory, LlmResponse,
};
pub use retry::RetryPolicy;
pub use titles::Titles;
