//! Sequential caption generation (APPLY mode).
//!
//! Each image goes through: optional context lookup, optional image load
//! (vision models only), then a backend call under the retry policy. Results
//! are handed to a callback as they complete so the CLI can stream them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use super::provider::{CaptionModel, CaptionRequest, ImageInput, LlmProvider};
use super::retry::RetryPolicy;
use crate::config::{CaptionBackendConfig, Config};
use crate::context::{ContextBuilder, ContextResult};
use crate::error::PipelineError;
use crate::pipeline::{ImageLoader, ImageSource};
use crate::types::CaptionRecord;

/// One image to caption.
#[derive(Debug, Clone)]
pub struct CaptionItem {
    pub source: ImageSource,
    pub title: String,
}

/// Result of captioning a single image.
#[derive(Debug)]
pub enum CaptionOutcome {
    Success(CaptionRecord),
    /// Image label and error message
    Failure(String, String),
}

struct ContextSource {
    builder: Arc<ContextBuilder>,
    document: PathBuf,
    top_n: usize,
    threshold: f32,
}

pub struct Captioner {
    provider: Arc<dyn LlmProvider>,
    model: CaptionModel,
    backend: CaptionBackendConfig,
    loader: ImageLoader,
    retry: RetryPolicy,
    context: Option<ContextSource>,
}

impl Captioner {
    pub fn new(provider: Box<dyn LlmProvider>, model: CaptionModel, config: &Config) -> Self {
        let retry = RetryPolicy::from_defaults(&config.defaults, provider.timeout());
        Self {
            provider: Arc::from(provider),
            model,
            backend: model.backend_config(&config.models).clone(),
            loader: ImageLoader::new(&config.limits),
            retry,
            context: None,
        }
    }

    /// Ground captions with sentences retrieved from `document`.
    pub fn with_context(
        mut self,
        builder: Arc<ContextBuilder>,
        document: PathBuf,
        top_n: usize,
        threshold: f32,
    ) -> Self {
        self.context = Some(ContextSource {
            builder,
            document,
            top_n,
            threshold,
        });
        self
    }

    pub fn model(&self) -> CaptionModel {
        self.model
    }

    /// Caption one image.
    pub async fn caption(&self, item: &CaptionItem) -> Result<CaptionRecord, PipelineError> {
        let label = item.source.label();
        let lookup = self.lookup_context(&item.title).await?;
        if lookup.context.is_none() && self.context.is_some() {
            tracing::debug!("No grounded context for {:?}", item.title);
        }

        let image = if self.model.accepts_images() {
            let loaded = self.loader.load(&item.source).await?;
            Some(ImageInput::from_loaded(&loaded)?)
        } else {
            None
        };

        let request = CaptionRequest::for_image(&item.title, lookup.context.as_deref(), image)
            .with_sampling(&self.backend);

        let provider = &self.provider;
        let request = &request;
        let response = self
            .retry
            .run(&label, move || provider.generate(request))
            .await?;

        tracing::debug!(
            "Captioned {label} in {}ms via {}",
            response.latency_ms,
            self.provider.name()
        );

        Ok(CaptionRecord {
            name: item.source.name(),
            image: label,
            title: item.title.clone(),
            caption: response.text,
            context: lookup.context,
            keywords: lookup.keywords,
            model: self.model.to_string(),
            backend: self.provider.name().to_string(),
            latency_ms: response.latency_ms,
            tokens_used: response.tokens_used,
            generated_at: Some(Utc::now().to_rfc3339()),
        })
    }

    /// Caption every item in order, reporting each outcome to `on_result`.
    ///
    /// Returns `(succeeded, failed)` counts.
    pub async fn caption_all<F>(&self, items: &[CaptionItem], mut on_result: F) -> (usize, usize)
    where
        F: FnMut(CaptionOutcome),
    {
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for item in items {
            match self.caption(item).await {
                Ok(record) => {
                    succeeded += 1;
                    on_result(CaptionOutcome::Success(record));
                }
                Err(e) => {
                    failed += 1;
                    let label = item.source.label();
                    tracing::warn!("Caption failed for {label}: {e}");
                    on_result(CaptionOutcome::Failure(label, e.to_string()));
                }
            }
        }

        (succeeded, failed)
    }

    /// Context lookups embed text with ONNX Runtime, so they run on the
    /// blocking pool.
    async fn lookup_context(&self, title: &str) -> Result<ContextResult, PipelineError> {
        let Some(source) = &self.context else {
            return Ok(ContextResult {
                context: None,
                keywords: Vec::new(),
            });
        };

        let builder = Arc::clone(&source.builder);
        let document = source.document.clone();
        let title = title.to_string();
        let (top_n, threshold) = (source.top_n, source.threshold);

        tokio::task::spawn_blocking(move || builder.build(&document, &title, top_n, threshold))
            .await
            .map_err(|e| PipelineError::Model {
                message: format!("Context task failed: {e}"),
            })?
    }
}
