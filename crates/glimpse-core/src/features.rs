//! Visual feature extraction (MODEL mode).
//!
//! Discovers images, encodes them in batches, and writes one
//! [`FeatureRecord`] per image to `features_<timestamp>.jsonl`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;

use crate::config::{Config, FeatureModelConfig};
use crate::embedding::FeatureEncoder;
use crate::error::PipelineError;
use crate::output::{timestamped_path, OutputFormat, OutputWriter};
use crate::pipeline::{ImageDiscovery, ImageLoader, ImageSource, LoadedImage};
use crate::types::FeatureRecord;

/// Image to embedding. Implemented by [`FeatureEncoder`].
pub trait ImageEmbedder: Send + Sync {
    fn embed_images(
        &self,
        images: &[&DynamicImage],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError>;
}

impl ImageEmbedder for FeatureEncoder {
    fn embed_images(
        &self,
        images: &[&DynamicImage],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.embed_batch(images, paths)
    }
}

pub struct FeatureExtractor {
    embedder: Arc<dyn ImageEmbedder>,
    model: FeatureModelConfig,
    loader: ImageLoader,
}

impl FeatureExtractor {
    pub fn new(embedder: Arc<dyn ImageEmbedder>, config: &Config) -> Self {
        Self {
            embedder,
            model: config.models.feature.clone(),
            loader: ImageLoader::new(&config.limits),
        }
    }

    /// Encode every image in `images_dir`.
    ///
    /// Returns the features file and the names of the encoded images, in
    /// order. Images that fail to load are skipped with a warning.
    pub async fn run(
        &self,
        images_dir: &Path,
        output_dir: &Path,
    ) -> Result<(PathBuf, Vec<String>), PipelineError> {
        self.run_with_progress(images_dir, output_dir, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_image` with each image name once
    /// it has been handled.
    pub async fn run_with_progress<F>(
        &self,
        images_dir: &Path,
        output_dir: &Path,
        mut on_image: F,
    ) -> Result<(PathBuf, Vec<String>), PipelineError>
    where
        F: FnMut(&str),
    {
        if !images_dir.exists() {
            return Err(PipelineError::FileNotFound(images_dir.to_path_buf()));
        }
        let discovered = ImageDiscovery.discover(images_dir);
        tracing::info!("Found {} images in {:?}", discovered.len(), images_dir);

        std::fs::create_dir_all(output_dir).map_err(|e| io_error(output_dir, e))?;
        let features_file = timestamped_path(output_dir, "features", OutputFormat::JsonLines);
        let file = File::create(&features_file).map_err(|e| io_error(&features_file, e))?;
        let mut writer = OutputWriter::new(BufWriter::new(file), OutputFormat::JsonLines);

        let batch_size = self.model.batch_size.max(1);
        let mut labels = Vec::with_capacity(discovered.len());

        for chunk in discovered.chunks(batch_size) {
            let mut batch: Vec<(String, LoadedImage)> = Vec::with_capacity(chunk.len());
            for image in chunk {
                match self
                    .loader
                    .load(&ImageSource::Local(image.image_path.clone()))
                    .await
                {
                    Ok(loaded) => batch.push((image.name.clone(), loaded)),
                    Err(e) => {
                        tracing::warn!("Skipping {}: {e}", image.name);
                        on_image(&image.name);
                    }
                }
            }
            if batch.is_empty() {
                continue;
            }

            let (batch, embeddings) = self.embed(batch).await?;
            for ((name, loaded), embedding) in batch.into_iter().zip(embeddings) {
                let record = FeatureRecord {
                    name: name.clone(),
                    image_path: PathBuf::from(loaded.source.label()),
                    model: self.model.name.clone(),
                    pretrained_dataset: self.model.pretrained_dataset.clone(),
                    embedding,
                };
                writer
                    .write(&record)
                    .map_err(|e| io_error(&features_file, e))?;
                on_image(&name);
                labels.push(name);
            }
        }

        writer.finish().map_err(|e| io_error(&features_file, e))?;
        tracing::info!(
            "Wrote {} feature vectors to {:?}",
            writer.items_written(),
            features_file
        );
        Ok((features_file, labels))
    }

    /// Inference runs on the blocking pool; the batch is moved there and back.
    async fn embed(
        &self,
        batch: Vec<(String, LoadedImage)>,
    ) -> Result<(Vec<(String, LoadedImage)>, Vec<Vec<f32>>), PipelineError> {
        let embedder = Arc::clone(&self.embedder);
        let (batch, result) = tokio::task::spawn_blocking(move || {
            let images: Vec<&DynamicImage> = batch.iter().map(|(_, l)| &l.decoded.image).collect();
            let paths: Vec<PathBuf> = batch
                .iter()
                .map(|(_, l)| PathBuf::from(l.source.label()))
                .collect();
            let result = embedder.embed_images(&images, &paths);
            drop(images);
            (batch, result)
        })
        .await
        .map_err(|e| PipelineError::Model {
            message: format!("Feature task failed: {e}"),
        })?;

        let embeddings = result?;
        if embeddings.len() != batch.len() {
            return Err(PipelineError::Model {
                message: format!(
                    "Encoder returned {} embeddings for {} images",
                    embeddings.len(),
                    batch.len()
                ),
            });
        }
        Ok((batch, embeddings))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::Document {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::png_bytes;
    use image::GenericImageView;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds an image as its (width, height), counting batches.
    struct SizeEmbedder {
        batches: AtomicUsize,
    }

    impl ImageEmbedder for SizeEmbedder {
        fn embed_images(
            &self,
            images: &[&DynamicImage],
            _paths: &[PathBuf],
        ) -> Result<Vec<Vec<f32>>, PipelineError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(images
                .iter()
                .map(|i| {
                    let (w, h) = i.dimensions();
                    vec![w as f32, h as f32]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_run_writes_features_in_batches() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for (name, size) in [("a.png", 2), ("b.png", 3), ("c.png", 4)] {
            std::fs::write(input.path().join(name), png_bytes(size, 1)).unwrap();
        }
        std::fs::write(input.path().join("notes.txt"), "skip me").unwrap();

        let mut config = Config::default();
        config.models.feature.batch_size = 2;
        let embedder = Arc::new(SizeEmbedder {
            batches: AtomicUsize::new(0),
        });
        let extractor = FeatureExtractor::new(embedder.clone(), &config);

        let mut seen = Vec::new();
        let (file, labels) = extractor
            .run_with_progress(input.path(), output.path(), |name| seen.push(name.to_string()))
            .await
            .unwrap();

        assert_eq!(labels, vec!["a.png", "b.png", "c.png"]);
        assert_eq!(seen, labels);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);

        let content = std::fs::read_to_string(&file).unwrap();
        let records: Vec<FeatureRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].embedding, vec![3.0, 1.0]);
        assert_eq!(records[0].model, config.models.feature.name);
        assert!(file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("features_"));
    }

    #[tokio::test]
    async fn test_run_skips_broken_images() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("good.png"), png_bytes(2, 2)).unwrap();
        std::fs::write(input.path().join("bad.png"), b"nope").unwrap();

        let extractor = FeatureExtractor::new(
            Arc::new(SizeEmbedder {
                batches: AtomicUsize::new(0),
            }),
            &Config::default(),
        );
        let (_, labels) = extractor.run(input.path(), output.path()).await.unwrap();
        assert_eq!(labels, vec!["good.png"]);
    }

    #[tokio::test]
    async fn test_run_missing_dir() {
        let output = tempfile::tempdir().unwrap();
        let extractor = FeatureExtractor::new(
            Arc::new(SizeEmbedder {
                batches: AtomicUsize::new(0),
            }),
            &Config::default(),
        );
        let err = extractor
            .run(Path::new("/nonexistent/images"), output.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }
}
