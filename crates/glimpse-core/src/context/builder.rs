//! Context retrieval for a titled image.
//!
//! ```text
//! title ──► entities + subjects ──► keywords ──► embed ──► max-pool ─┐
//! document ──► text ──► sentences ──► embed ─────────────► cosine ◄──┘
//!                                                           │
//!                         rank ► threshold / relax ► top_n ► join + clean ► grounding check
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::ContextConfig;
use crate::embedding::TextEmbedder;
use crate::error::{ConfigError, PipelineError};
use crate::math::{cosine_similarity, max_pool};
use crate::nlp::{PosTagger, SentenceSegmenter};

use super::clean::ContextCleaner;
use super::document::convert_docx_to_txt;
use super::keywords::{build_keywords, extract_entities, extract_subjects, KeywordRules};
use super::select::{select_paragraphs, RelaxPolicy};

/// Outcome of a context lookup. `context` is `None` when nothing relevant and
/// grounded was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResult {
    pub context: Option<String>,
    pub keywords: Vec<String>,
}

/// Sentences per embedding call unless overridden.
pub const DEFAULT_EMBED_BATCH: usize = 32;

/// A segmented, embedded document.
struct ParagraphIndex {
    paragraphs: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Builds grounded context strings from a reference document.
///
/// Segmented and embedded documents are cached by path, so repeated lookups
/// against the same document only embed the keywords.
pub struct ContextBuilder {
    embedder: Arc<dyn TextEmbedder>,
    tagger: Box<dyn PosTagger>,
    segmenter: SentenceSegmenter,
    rules: KeywordRules,
    cleaner: ContextCleaner,
    policy: RelaxPolicy,
    batch_size: usize,
    text_output: Option<PathBuf>,
    cache: Mutex<HashMap<PathBuf, Arc<ParagraphIndex>>>,
}

impl ContextBuilder {
    pub fn new(
        config: &ContextConfig,
        embedder: Arc<dyn TextEmbedder>,
        tagger: Box<dyn PosTagger>,
    ) -> Result<Self, ConfigError> {
        let cleaner = ContextCleaner::new(&config.filler_pattern)
            .map_err(|e| ConfigError::ValidationError(format!("context.filler_pattern: {e}")))?;
        Ok(Self {
            embedder,
            tagger,
            segmenter: SentenceSegmenter::from_config(config),
            rules: KeywordRules::from_config(config)?,
            cleaner,
            policy: RelaxPolicy::from_config(config),
            batch_size: DEFAULT_EMBED_BATCH,
            text_output: None,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Embed document sentences `batch_size` at a time.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Also write the extracted document text to `path`.
    pub fn with_text_output(mut self, path: Option<PathBuf>) -> Self {
        self.text_output = path;
        self
    }

    /// Find up to `top_n` document sentences relevant to `title`.
    pub fn build(
        &self,
        document: &Path,
        title: &str,
        top_n: usize,
        threshold: f32,
    ) -> Result<ContextResult, PipelineError> {
        let index = self.index(document)?;
        self.select(&index, title, top_n, threshold)
    }

    /// Same as [`build`](Self::build) over already extracted text.
    pub fn build_from_text(
        &self,
        text: &str,
        title: &str,
        top_n: usize,
        threshold: f32,
    ) -> Result<ContextResult, PipelineError> {
        let index = self.embed_document(text)?;
        self.select(&index, title, top_n, threshold)
    }

    fn select(
        &self,
        index: &ParagraphIndex,
        title: &str,
        top_n: usize,
        threshold: f32,
    ) -> Result<ContextResult, PipelineError> {
        let entities = extract_entities(title, &self.rules.seed, &self.rules.acronym);
        let subjects = extract_subjects(title, self.tagger.as_ref(), &self.rules.stop_words);
        let keywords = build_keywords(title, &entities, &subjects);
        tracing::debug!(
            "Title {:?}: entities={:?} subjects={:?}",
            title,
            entities,
            subjects
        );

        if index.paragraphs.is_empty() {
            return Ok(ContextResult {
                context: None,
                keywords,
            });
        }

        let keyword_embeddings = self.embedder.embed_batch(&keywords)?;
        let Some(aggregate) = max_pool(&keyword_embeddings) else {
            return Ok(ContextResult {
                context: None,
                keywords,
            });
        };

        let similarities: Vec<f32> = index
            .embeddings
            .iter()
            .map(|p| cosine_similarity(&aggregate, p))
            .collect();
        let selected = select_paragraphs(&similarities, top_n, threshold, self.policy);
        let chosen: Vec<&str> = selected
            .iter()
            .map(|&i| index.paragraphs[i].as_str())
            .collect();
        let context = self.cleaner.join(&chosen);

        let check_words: Vec<&String> = entities.iter().chain(subjects.iter()).collect();
        let grounded =
            check_words.is_empty() || check_words.iter().any(|w| context.contains(w.as_str()));

        let context = if context.is_empty() {
            None
        } else if !grounded {
            tracing::debug!("Context for {:?} mentions none of {:?}", title, check_words);
            None
        } else {
            Some(context)
        };

        Ok(ContextResult { context, keywords })
    }

    fn index(&self, document: &Path) -> Result<Arc<ParagraphIndex>, PipelineError> {
        let key = document.to_path_buf();
        if let Some(index) = self.lock_cache()?.get(&key) {
            return Ok(Arc::clone(index));
        }

        let text = convert_docx_to_txt(document, self.text_output.as_deref())?;
        let index = Arc::new(self.embed_document(&text)?);
        tracing::info!(
            "Indexed {} sentences from {:?}",
            index.paragraphs.len(),
            document
        );
        self.lock_cache()?.insert(key, Arc::clone(&index));
        Ok(index)
    }

    fn embed_document(&self, text: &str) -> Result<ParagraphIndex, PipelineError> {
        let paragraphs = self.segmenter.split(text);
        let mut embeddings = Vec::with_capacity(paragraphs.len());
        for (batch_idx, chunk) in paragraphs.chunks(self.batch_size).enumerate() {
            embeddings.extend(self.embedder.embed_batch(chunk)?);

            let encoded = (batch_idx + 1) * self.batch_size;
            if encoded % 1000 < self.batch_size && encoded < paragraphs.len() {
                tracing::debug!("  Embedded {}/{} sentences", encoded, paragraphs.len());
            }
        }
        if embeddings.len() != paragraphs.len() {
            return Err(PipelineError::Model {
                message: format!(
                    "Embedder returned {} vectors for {} sentences",
                    embeddings.len(),
                    paragraphs.len()
                ),
            });
        }
        Ok(ParagraphIndex {
            paragraphs,
            embeddings,
        })
    }

    fn lock_cache(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<ParagraphIndex>>>, PipelineError>
    {
        self.cache.lock().map_err(|e| PipelineError::Model {
            message: format!("Context cache lock poisoned: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LexiconConfig;
    use crate::nlp::LexiconTagger;
    use crate::test_support::docx_bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text by counting marker words, one dimension per marker.
    struct MarkerEmbedder {
        markers: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl MarkerEmbedder {
        fn new(markers: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                markers: markers.to_vec(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TextEmbedder for MarkerEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.markers
                        .iter()
                        .map(|m| lower.matches(m).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    /// Records the largest batch it is handed.
    #[derive(Default)]
    struct BatchRecorder {
        largest: AtomicUsize,
        total: AtomicUsize,
    }

    impl TextEmbedder for BatchRecorder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            self.largest.fetch_max(texts.len(), Ordering::SeqCst);
            self.total.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn builder(embedder: Arc<dyn TextEmbedder>) -> ContextBuilder {
        let config = ContextConfig::default();
        ContextBuilder::new(
            &config,
            embedder,
            Box::new(LexiconTagger::new(&LexiconConfig::default())),
        )
        .unwrap()
    }

    const DOC: &str = "El puerto de Valencia creció en 1990 con dos muelles. \
        La lonja del pescado cerró pronto.\n\n\
        Los barcos llegan a Valencia cada día. \
        Nadie recuerda el mercado.";

    #[test]
    fn test_selects_grounded_paragraphs() {
        let b = builder(MarkerEmbedder::new(&["valencia", "puerto", "mercado"]));
        let result = b.build_from_text(DOC, "Puerto de Valencia", 3, 0.5).unwrap();

        assert_eq!(
            result.keywords,
            vec!["Puerto de Valencia", "Valencia", "Puerto"]
        );
        let context = result.context.unwrap();
        assert_eq!(
            context,
            "El puerto de Valencia creció en con dos muelles Los barcos llegan a Valencia cada día."
        );
    }

    #[test]
    fn test_top_n_limits_joined_paragraphs() {
        let b = builder(MarkerEmbedder::new(&["valencia", "puerto", "mercado"]));
        let result = b.build_from_text(DOC, "Puerto de Valencia", 1, 0.5).unwrap();
        assert_eq!(
            result.context.as_deref(),
            Some("El puerto de Valencia creció en con dos muelles.")
        );
    }

    #[test]
    fn test_ungrounded_context_is_none() {
        // "mercado" drives similarity, but neither "Sevilla" nor the
        // capitalized "Mercado" appears verbatim in the selected sentence.
        let b = builder(MarkerEmbedder::new(&["mercado"]));
        let result = b.build_from_text(DOC, "Mercado de Sevilla", 3, 0.5).unwrap();
        assert_eq!(result.context, None);
        assert_eq!(result.keywords[0], "Mercado de Sevilla");
    }

    #[test]
    fn test_low_similarity_is_none() {
        let b = builder(MarkerEmbedder::new(&["tren", "estación"]));
        let result = b.build_from_text(DOC, "Estación", 3, 0.5).unwrap();
        assert_eq!(result.context, None);
    }

    #[test]
    fn test_empty_document_is_none() {
        let b = builder(MarkerEmbedder::new(&["valencia"]));
        let result = b.build_from_text("  \n\n ", "Valencia", 3, 0.5).unwrap();
        assert_eq!(result.context, None);
        assert_eq!(result.keywords, vec!["Valencia"]);
    }

    #[test]
    fn test_build_reads_docx_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.docx");
        std::fs::write(
            &path,
            docx_bytes(&["El puerto de Valencia se amplió.", "Nadie recuerda el mercado."]),
        )
        .unwrap();
        let text_out = dir.path().join("context.txt");

        let embedder = MarkerEmbedder::new(&["valencia", "puerto"]);
        let b = builder(embedder.clone()).with_text_output(Some(text_out.clone()));

        let first = b.build(&path, "Puerto de Valencia", 3, 0.5).unwrap();
        let second = b.build(&path, "Puerto de Valencia", 3, 0.5).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.context.as_deref(),
            Some("El puerto de Valencia se amplió.")
        );
        assert!(text_out.exists());
        // One document embedding plus one keyword embedding per build.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_long_document_is_embedded_in_batches() {
        let text: String = (0..5000)
            .map(|i| format!("El muelle número {i} de Valencia. "))
            .collect();
        let recorder = Arc::new(BatchRecorder::default());
        let b = builder(recorder.clone()).with_batch_size(64);

        b.build_from_text(&text, "Puerto de Valencia", 3, 0.5)
            .unwrap();
        assert!(recorder.largest.load(Ordering::SeqCst) <= 64);
        // 5000 sentences plus the keywords.
        assert!(recorder.total.load(Ordering::SeqCst) >= 5000);
    }

    #[test]
    fn test_default_batch_size_bounds_embedding_calls() {
        let text: String = (0..100).map(|i| format!("Frase {i} del puerto. ")).collect();
        let recorder = Arc::new(BatchRecorder::default());
        let b = builder(recorder.clone());

        b.build_from_text(&text, "Puerto", 3, 0.5).unwrap();
        assert_eq!(recorder.largest.load(Ordering::SeqCst), DEFAULT_EMBED_BATCH);
    }
}
