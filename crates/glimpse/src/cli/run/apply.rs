//! APPLY mode: caption images with the selected model.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glimpse_core::llm::{CaptionItem, CaptionOutcome, Titles};
use glimpse_core::output::timestamped_path;
use glimpse_core::pipeline::parse_image_list;
use glimpse_core::{
    hub, CaptionModel, Captioner, Config, Device, ImageDiscovery, ImageSource,
    LlmProviderFactory, OutputWriter,
};

use super::{create_progress_bar, print_summary, resolve_format, RunArgs};
use crate::cli::context::load_builder;

pub async fn run(
    args: &RunArgs,
    config: &Config,
    model: CaptionModel,
    device: Device,
) -> anyhow::Result<()> {
    tracing::info!("Caption model: {model}");

    if needs_login(model, config) {
        hub::login(config).await?;
    } else {
        tracing::debug!("No hub token configured, skipping hub login");
    }

    let provider = LlmProviderFactory::create(model, config)?;
    if !provider.is_available().await {
        tracing::warn!(
            "Caption backend {} is not reachable. Requests will be attempted anyway.",
            provider.name()
        );
    }
    let mut captioner = Captioner::new(provider, model, config);

    let sources = collect_sources(args.input.as_deref(), config)?;
    if sources.is_empty() {
        tracing::warn!("No images to caption");
        return Ok(());
    }
    tracing::info!("Found {} image(s) to caption", sources.len());

    let titles = Titles::load_optional(config.environment.titles_file.as_deref())?;
    if !titles.is_empty() {
        tracing::info!("Loaded {} titles", titles.len());
    }
    let items: Vec<CaptionItem> = sources
        .into_iter()
        .map(|source| {
            let title = titles.title_for(&source.name());
            CaptionItem { source, title }
        })
        .collect();

    if let Some(document) = context_document(args, config)? {
        match load_builder(
            config,
            device,
            config.environment.context_text_output.clone(),
        ) {
            Ok(builder) => {
                tracing::info!("Grounding captions with {:?}", document);
                captioner = captioner.with_context(
                    Arc::new(builder),
                    document,
                    config.context.top_n,
                    config.context.threshold,
                );
            }
            Err(e) => tracing::warn!("Captioning without context: {e}"),
        }
    }

    let format = resolve_format(args.format, config)?;
    let output_path = match &args.output {
        Some(path) => path.clone(),
        None => timestamped_path(&config.output_dir(), "captions", format),
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&output_path)?;
    let mut writer = OutputWriter::new(BufWriter::new(file), format);

    let progress = create_progress_bar(items.len() as u64);
    let start_time = Instant::now();
    let mut write_error: Option<std::io::Error> = None;

    let (succeeded, failed) = captioner
        .caption_all(&items, |outcome| {
            match outcome {
                CaptionOutcome::Success(record) => {
                    progress.set_message(record.name.clone());
                    if write_error.is_none() {
                        if let Err(e) = writer.write(&record) {
                            write_error = Some(e);
                        }
                    }
                }
                CaptionOutcome::Failure(label, message) => {
                    progress.suspend(|| tracing::error!("Failed: {label} - {message}"));
                }
            }
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    if let Some(e) = write_error {
        anyhow::bail!("Failed to write captions to {:?}: {e}", output_path);
    }
    writer.finish()?;
    tracing::info!("Captions written to {:?}", output_path);

    print_summary(
        "Caption Generation",
        succeeded,
        failed,
        start_time.elapsed(),
        &output_path,
    );
    Ok(())
}

/// Hub login is required by the huggingface backend and attempted whenever a
/// token is configured.
fn needs_login(model: CaptionModel, config: &Config) -> bool {
    let backend = model.backend_config(&config.models).backend.to_lowercase();
    matches!(backend.as_str(), "huggingface" | "hf") || config.hub_token().is_some()
}

/// Images from `--input` (a directory, or a separator-joined list of paths
/// and URLs), else every image in `environment.images_dir`.
fn collect_sources(input: Option<&str>, config: &Config) -> anyhow::Result<Vec<ImageSource>> {
    match input {
        Some(value) if Path::new(value.trim()).is_dir() => Ok(discover(Path::new(value.trim()))),
        Some(value) => {
            let sources = parse_image_list(value, &config.defaults.image_separator);
            for source in &sources {
                if let ImageSource::Local(path) = source {
                    if !path.exists() {
                        anyhow::bail!(
                            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                            path
                        );
                    }
                }
            }
            Ok(sources)
        }
        None => {
            let images_dir = config.images_dir();
            if !images_dir.exists() {
                anyhow::bail!(
                    "Image directory does not exist: {:?}\n\n  Hint: Set environment.images_dir or pass --input.",
                    images_dir
                );
            }
            Ok(discover(&images_dir))
        }
    }
}

fn discover(dir: &Path) -> Vec<ImageSource> {
    ImageDiscovery
        .discover(dir)
        .into_iter()
        .map(|image| ImageSource::Local(image.image_path))
        .collect()
}

/// The document to mine for context, if context is enabled.
fn context_document(args: &RunArgs, config: &Config) -> anyhow::Result<Option<PathBuf>> {
    if args.no_context {
        return Ok(None);
    }
    let Some(document) = args
        .context_doc
        .clone()
        .or_else(|| config.environment.context_document.clone())
    else {
        tracing::info!("No context document configured, captioning without context");
        return Ok(None);
    };
    if !document.exists() {
        anyhow::bail!("Context document does not exist: {:?}", document);
    }
    Ok(Some(document))
}
