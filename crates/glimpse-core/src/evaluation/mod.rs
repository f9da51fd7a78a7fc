//! Caption evaluation (EVAL mode).
//!
//! Scores generated captions against human references with BLEU-1..4,
//! ROUGE-L, CIDEr-D and, when a sentence encoder is available, mean cosine
//! similarity between caption and reference embeddings.
//!
//! Inputs:
//! - captions: JSONL of [`CaptionRecord`] (a JSON array is also accepted)
//! - references: JSON object `{ "image name": ["reference", ...] }`

pub mod bleu;
pub mod cider;
pub mod rouge;
pub mod tokenize;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedding::TextEmbedder;
use crate::error::PipelineError;
use crate::math::cosine_similarity;
use crate::types::CaptionRecord;

use self::bleu::{sentence_bleu, BleuStats};
use self::cider::CiderD;
use self::rouge::{rouge_l, DEFAULT_BETA};
use self::tokenize::tokenize;

/// Scores of one caption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageScore {
    pub name: String,
    pub caption: String,
    pub bleu4: f64,
    pub rouge_l: f64,
    pub cider: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<f64>,
}

/// Corpus-level scores plus the per-caption breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Captions that had references and were scored
    pub images: usize,
    /// Corpus BLEU-1..4
    pub bleu: [f64; 4],
    /// Mean ROUGE-L
    pub rouge_l: f64,
    /// Mean CIDEr-D
    pub cider: f64,
    /// Mean caption/reference embedding cosine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<f64>,
    pub per_image: Vec<ImageScore>,
}

#[derive(Default)]
pub struct Evaluator {
    embedder: Option<Arc<dyn TextEmbedder>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report embedding similarity.
    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Load and score caption and reference files.
    pub fn evaluate_files(
        &self,
        captions: &Path,
        references: &Path,
    ) -> Result<EvaluationReport, PipelineError> {
        let captions = load_captions(captions)?;
        let references = load_references(references)?;
        self.evaluate(&captions, &references)
    }

    /// Score captions that have references. Others are skipped with a warning.
    pub fn evaluate(
        &self,
        captions: &[CaptionRecord],
        references: &HashMap<String, Vec<String>>,
    ) -> Result<EvaluationReport, PipelineError> {
        let mut pairs: Vec<(&CaptionRecord, &Vec<String>)> = Vec::with_capacity(captions.len());
        for record in captions {
            match lookup(references, &record.name) {
                Some(refs) if !refs.is_empty() => pairs.push((record, refs)),
                _ => tracing::warn!("No references for {}, skipping", record.name),
            }
        }
        if pairs.is_empty() {
            return Err(PipelineError::Evaluation {
                message: "No caption has a matching reference".to_string(),
            });
        }

        let hyps: Vec<Vec<String>> = pairs.iter().map(|(c, _)| tokenize(&c.caption)).collect();
        let refs: Vec<Vec<Vec<String>>> = pairs
            .iter()
            .map(|(_, r)| r.iter().map(|s| tokenize(s)).collect())
            .collect();

        let cider = CiderD::new(&refs);
        let mut bleu = BleuStats::default();
        let mut per_image = Vec::with_capacity(pairs.len());

        for (i, (record, raw_refs)) in pairs.iter().enumerate() {
            bleu.add(&hyps[i], &refs[i]);
            let semantic = match &self.embedder {
                Some(embedder) => Some(semantic_score(embedder.as_ref(), &record.caption, raw_refs)?),
                None => None,
            };
            per_image.push(ImageScore {
                name: record.name.clone(),
                caption: record.caption.clone(),
                bleu4: sentence_bleu(&hyps[i], &refs[i])[3],
                rouge_l: rouge_l(&hyps[i], &refs[i], DEFAULT_BETA),
                cider: cider.score(&hyps[i], &refs[i]),
                semantic,
            });
        }

        let n = per_image.len() as f64;
        let report = EvaluationReport {
            images: per_image.len(),
            bleu: bleu.scores(),
            rouge_l: per_image.iter().map(|s| s.rouge_l).sum::<f64>() / n,
            cider: per_image.iter().map(|s| s.cider).sum::<f64>() / n,
            semantic: self
                .embedder
                .as_ref()
                .map(|_| per_image.iter().filter_map(|s| s.semantic).sum::<f64>() / n),
            per_image,
        };
        tracing::info!(
            "Evaluated {} captions: BLEU-4 {:.4}, ROUGE-L {:.4}, CIDEr-D {:.4}",
            report.images,
            report.bleu[3],
            report.rouge_l,
            report.cider
        );
        Ok(report)
    }
}

/// Read captions from JSONL, or from a JSON array.
pub fn load_captions(path: &Path) -> Result<Vec<CaptionRecord>, PipelineError> {
    let content = read(path)?;
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| parse_error(path, e));
    }
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(|e| parse_error(path, e)))
        .collect()
}

/// Read `{ name: [reference, ...] }`.
pub fn load_references(path: &Path) -> Result<HashMap<String, Vec<String>>, PipelineError> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|e| parse_error(path, e))
}

/// References for an image name, falling back to the name without extension.
fn lookup<'a>(references: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a Vec<String>> {
    references.get(name).or_else(|| {
        let stem = Path::new(name).file_stem()?.to_str()?;
        references.get(stem)
    })
}

fn semantic_score(
    embedder: &dyn TextEmbedder,
    caption: &str,
    references: &[String],
) -> Result<f64, PipelineError> {
    let mut texts = Vec::with_capacity(references.len() + 1);
    texts.push(caption.to_string());
    texts.extend(references.iter().cloned());

    let vectors = embedder.embed_batch(&texts)?;
    let Some((caption_vec, ref_vecs)) = vectors.split_first() else {
        return Ok(0.0);
    };
    if ref_vecs.is_empty() {
        return Ok(0.0);
    }
    let total: f64 = ref_vecs
        .iter()
        .map(|r| cosine_similarity(caption_vec, r) as f64)
        .sum();
    Ok(total / ref_vecs.len() as f64)
}

fn read(path: &Path) -> Result<String, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| PipelineError::Evaluation {
        message: format!("Failed to read {}: {e}", path.display()),
    })
}

fn parse_error(path: &Path, e: serde_json::Error) -> PipelineError {
    PipelineError::Evaluation {
        message: format!("Failed to parse {}: {e}", path.display()),
    }
}
