//! Sentence embedding with a sentence-transformers ONNX export.
//!
//! Inputs are padded per batch to the longest sequence. Token states are
//! mean-pooled under the attention mask and L2-normalized, which reproduces
//! the `sentence-transformers` output for MiniLM-style models.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;
use tokenizers::{Tokenizer, TruncationParams};

use crate::config::SentenceModelConfig;
use crate::device::Device;
use crate::error::PipelineError;

use super::session::build_session;
use super::TextEmbedder;

/// The sentence encoder ONNX filename inside `{model_dir}/{name}/`.
pub const SENTENCE_MODEL_FILENAME: &str = "model.onnx";

/// Tokenizer filename next to the ONNX model.
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Sentence encoder over ONNX Runtime.
pub struct SentenceEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    uses_token_type_ids: bool,
    batch_size: usize,
}

impl SentenceEncoder {
    /// Load the encoder from `{model_dir}/{name}/`.
    pub fn load(
        config: &SentenceModelConfig,
        model_dir: &Path,
        device: Device,
    ) -> Result<Self, PipelineError> {
        let dir = Self::model_path(config, model_dir);
        let model_path = dir.join(SENTENCE_MODEL_FILENAME);
        let tokenizer_path = dir.join(TOKENIZER_FILENAME);

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(PipelineError::Model {
                    message: format!(
                        "Sentence encoder file not found at {:?}. Run `glimpse models download` first.",
                        path
                    ),
                });
            }
        }

        tracing::info!("Loading sentence encoder {}", config.name);
        let session = build_session(&model_path, device)?;
        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|i| i.name() == "token_type_ids");

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            })?;
        // Padding is done per batch below.
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to configure truncation: {e}"),
            })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            uses_token_type_ids,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Directory holding the model and tokenizer.
    pub fn model_path(config: &SentenceModelConfig, model_dir: &Path) -> PathBuf {
        model_dir.join(&config.name)
    }

    /// Check whether both model files exist.
    pub fn model_exists(config: &SentenceModelConfig, model_dir: &Path) -> bool {
        let dir = Self::model_path(config, model_dir);
        dir.join(SENTENCE_MODEL_FILENAME).exists() && dir.join(TOKENIZER_FILENAME).exists()
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PipelineError::Model {
                message: format!("Tokenization failed: {e}"),
            })?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];
        for (b, encoding) in encodings.iter().enumerate() {
            let offset = b * seq_len;
            for (s, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + s] = id as i64;
            }
            for (s, &m) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + s] = m as i64;
            }
            for (s, &t) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + s] = t as i64;
            }
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let tensor = |name: &str, data: Vec<i64>| {
            Value::from_array((shape.clone(), data)).map_err(|e| PipelineError::Model {
                message: format!("Failed to create {name} tensor: {e}"),
            })
        };
        let ids_value = tensor("input_ids", input_ids)?;
        let mask_value = tensor("attention_mask", attention_mask.clone())?;

        let mut session = self.session.lock().map_err(|e| PipelineError::Model {
            message: format!("Sentence encoder lock poisoned: {e}"),
        })?;

        let outputs = if self.uses_token_type_ids {
            let type_value = tensor("token_type_ids", token_type_ids)?;
            session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value,
                "token_type_ids" => type_value,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value,
            ])
        }
        .map_err(|e| PipelineError::Model {
            message: format!("Sentence encoder inference failed: {e}"),
        })?;

        let hidden = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: "Sentence encoder produced no outputs".to_string(),
            })?;

        let (out_shape, data) =
            hidden
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Model {
                    message: format!("Failed to extract last_hidden_state: {e}"),
                })?;

        if out_shape.len() != 3 {
            return Err(PipelineError::Model {
                message: format!("Unexpected last_hidden_state shape: {:?}", out_shape),
            });
        }
        let hidden_size = out_shape[2] as usize;

        Ok(mean_pool(data, &attention_mask, batch_size, seq_len, hidden_size))
    }
}

impl TextEmbedder for SentenceEncoder {
    /// Runs one inference per `models.sentence.batch_size` texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.encode_batch(chunk)?);
        }
        Ok(out)
    }
}

/// Attention-masked mean over the sequence axis, then L2 normalization.
fn mean_pool(
    hidden: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    hidden_size: usize,
) -> Vec<Vec<f32>> {
    (0..batch_size)
        .map(|b| {
            let mut pooled = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;
            for s in 0..seq_len {
                if attention_mask[b * seq_len + s] == 0 {
                    continue;
                }
                count += 1.0;
                let base = (b * seq_len + s) * hidden_size;
                for (h, value) in pooled.iter_mut().enumerate() {
                    *value += hidden[base + h];
                }
            }
            let count = count.max(1e-9);
            for value in pooled.iter_mut() {
                *value /= count;
            }
            crate::math::l2_normalize_in_place(&mut pooled);
            pooled
        })
        .collect()
}
