//! Glimpse Core - image captioning pipeline library.
//!
//! Glimpse extracts visual features from image sets, generates captions with
//! language and vision-language models (optionally grounded with context
//! mined from a reference document), and scores captions against references.
//!
//! # Architecture
//!
//! Inference is delegated: encoders run in ONNX Runtime and caption models
//! are reached over HTTP. This crate is the glue around them.
//!
//! ```text
//! MODEL:  images → decode → CLIP encoder → features_<ts>.jsonl
//! APPLY:  image + title → context (document sentences) → caption backend → captions_<ts>.jsonl
//! EVAL:   captions + references → BLEU / ROUGE-L / CIDEr-D → report
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use glimpse_core::{Config, ContextBuilder, Device, LexiconTagger, SentenceEncoder};
//!
//! let config = Config::load()?;
//! let encoder = SentenceEncoder::load(&config.models.sentence, &config.model_dir(), Device::Cpu)?;
//! let builder = ContextBuilder::new(
//!     &config.context,
//!     Arc::new(encoder),
//!     Box::new(LexiconTagger::new(&config.context.lexicon)),
//! )?;
//! let result = builder.build("history.docx".as_ref(), "Puerto de Valencia", 3, 0.5)?;
//! println!("{:?}", result.context);
//! ```

// Module declarations
pub mod config;
pub mod context;
pub mod device;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod hub;
pub mod llm;
pub mod math;
pub mod nlp;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use context::{ContextBuilder, ContextResult, DocxReader, RelaxPolicy};
pub use device::Device;
pub use embedding::{FeatureEncoder, SentenceEncoder, TextEmbedder};
pub use error::{ConfigError, GlimpseError, PipelineError, PipelineResult, Result};
pub use evaluation::{EvaluationReport, Evaluator};
pub use features::FeatureExtractor;
pub use llm::{CaptionModel, Captioner, LlmProviderFactory};
pub use nlp::{LexiconTagger, PosTagger, SentenceSegmenter};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{ImageDiscovery, ImageLoader, ImageSource};
pub use types::{CaptionRecord, FeatureRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
