//! MODEL mode: extract visual features for a directory of images.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glimpse_core::{Config, Device, FeatureEncoder, FeatureExtractor, ImageDiscovery};

use super::{create_progress_bar, print_summary, RunArgs};

pub async fn run(args: &RunArgs, config: &Config, device: Device) -> anyhow::Result<()> {
    let images_dir = args
        .input
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.images_dir());
    if !images_dir.exists() {
        anyhow::bail!(
            "Image path does not exist: {:?}\n\n  Hint: Set environment.images_dir or pass --input.",
            images_dir
        );
    }

    let model_dir = config.model_dir();
    if !FeatureEncoder::model_exists(&config.models.feature, &model_dir) {
        anyhow::bail!(
            "Feature encoder not found at {:?}.\n\n  Hint: Run `glimpse models download` first.",
            FeatureEncoder::model_path(&config.models.feature, &model_dir)
        );
    }
    let encoder = FeatureEncoder::load(&config.models.feature, &model_dir, device)?;
    let extractor = FeatureExtractor::new(Arc::new(encoder), config);

    let total = ImageDiscovery.discover(&images_dir).len();
    if total == 0 {
        tracing::warn!("No supported image files found at {:?}", images_dir);
    }

    let progress = create_progress_bar(total as u64);
    let start_time = Instant::now();
    let (features_file, names) = extractor
        .run_with_progress(&images_dir, &config.output_dir(), |name| {
            progress.inc(1);
            progress.set_message(name.to_string());
        })
        .await?;
    progress.finish_and_clear();

    let features_file = match &args.output {
        Some(dest) => {
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            move_file(&features_file, dest)?;
            dest.clone()
        }
        None => features_file,
    };

    tracing::info!("Features written to {:?}", features_file);
    print_summary(
        "Feature Extraction",
        names.len(),
        total.saturating_sub(names.len()),
        start_time.elapsed(),
        &features_file,
    );
    Ok(())
}

/// Rename, falling back to copy-and-delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("features_1.jsonl");
        let to = dir.path().join("out.jsonl");
        std::fs::write(&from, "{}\n").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "{}\n");
    }

    #[tokio::test]
    async fn test_missing_images_dir_fails_before_loading_models() {
        let config = Config::default();
        let args = RunArgs {
            input: Some("/nonexistent/images".to_string()),
            ..RunArgs::default()
        };
        let err = run(&args, &config, Device::Cpu).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
