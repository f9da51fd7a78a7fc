//! ONNX encoders: CLIP visual features and sentence embeddings.
//!
//! # Usage
//!
//! ```rust,ignore
//! use glimpse_core::embedding::{FeatureEncoder, SentenceEncoder, TextEmbedder};
//! use glimpse_core::{Config, Device};
//!
//! let config = Config::default();
//! let encoder = FeatureEncoder::load(&config.models.feature, &config.model_dir(), Device::Cpu)?;
//! let features = encoder.embed_batch(&images, &paths)?;
//!
//! let sentences = SentenceEncoder::load(&config.models.sentence, &config.model_dir(), Device::Cpu)?;
//! let vectors = sentences.embed_batch(&["a short paragraph".to_string()])?;
//! ```

pub(crate) mod clip;
pub(crate) mod preprocess;
pub mod sentence;
pub mod session;

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::config::FeatureModelConfig;
use crate::device::Device;
use crate::error::PipelineError;

use self::clip::ClipVisualSession;
use self::preprocess::preprocess;

pub use self::sentence::SentenceEncoder;

/// The visual encoder ONNX filename inside `{model_dir}/{name}/`.
pub const VISUAL_MODEL_FILENAME: &str = "visual.onnx";

/// Text to fixed-length vector embedding.
///
/// Implementations return one vector per input, in order, all with the same
/// dimension.
pub trait TextEmbedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Model {
                message: "Text embedder returned empty result for single input".to_string(),
            })
    }
}

/// Visual feature encoder for MODEL mode.
pub struct FeatureEncoder {
    session: ClipVisualSession,
    image_size: u32,
}

impl FeatureEncoder {
    /// Load the visual encoder from `{model_dir}/{name}/visual.onnx`.
    pub fn load(
        config: &FeatureModelConfig,
        model_dir: &Path,
        device: Device,
    ) -> Result<Self, PipelineError> {
        let model_path = Self::model_path(config, model_dir);

        if !model_path.exists() {
            return Err(PipelineError::Embedding {
                path: model_path,
                message: "Model not found. Run `glimpse models download` first.".to_string(),
            });
        }

        tracing::info!(
            "Loading feature encoder {} ({}) from {:?}",
            config.name,
            config.pretrained_dataset,
            model_path
        );
        let session = ClipVisualSession::load(&model_path, device, &config.output_name)?;

        Ok(Self {
            session,
            image_size: config.image_size,
        })
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Encode one batch of images; one normalized vector per image.
    pub fn embed_batch(
        &self,
        images: &[&DynamicImage],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let tensors: Vec<_> = images
            .iter()
            .map(|image| preprocess(image, self.image_size))
            .collect();
        self.session.embed_batch(&tensors, paths)
    }

    pub fn model_exists(config: &FeatureModelConfig, model_dir: &Path) -> bool {
        Self::model_path(config, model_dir).exists()
    }

    pub fn model_path(config: &FeatureModelConfig, model_dir: &Path) -> PathBuf {
        model_dir.join(&config.name).join(VISUAL_MODEL_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl TextEmbedder for Constant {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[test]
    fn test_embed_single_uses_batch() {
        assert_eq!(Constant.embed("abcd").unwrap(), vec![4.0]);
    }

    #[test]
    fn test_feature_encoder_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = FeatureModelConfig::default();
        assert!(!FeatureEncoder::model_exists(&config, dir.path()));
        let err = FeatureEncoder::load(&config, dir.path(), Device::Cpu)
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Embedding { .. }));
        assert!(FeatureEncoder::model_path(&config, dir.path()).ends_with("ViT-L-14/visual.onnx"));
    }
}
