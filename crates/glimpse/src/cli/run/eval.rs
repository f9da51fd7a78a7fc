//! EVAL mode: score captions against reference captions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glimpse_core::output::timestamp;
use glimpse_core::{Config, Device, EvaluationReport, Evaluator, SentenceEncoder};

use super::RunArgs;

pub async fn run(args: &RunArgs, config: &Config, device: Device) -> anyhow::Result<()> {
    let captions = captions_file(args.input.as_deref(), config)?;
    let references = config.environment.references_file.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "No references file configured.\n\n  Hint: Set environment.references_file to a JSON map of image name to reference captions."
        )
    })?;
    if !references.exists() {
        anyhow::bail!("References file does not exist: {:?}", references);
    }
    tracing::info!("Evaluating {:?} against {:?}", captions, references);

    let mut evaluator = Evaluator::new();
    let model_dir = config.model_dir();
    if SentenceEncoder::model_exists(&config.models.sentence, &model_dir) {
        let encoder = SentenceEncoder::load(&config.models.sentence, &model_dir, device)?;
        evaluator = evaluator.with_embedder(Arc::new(encoder));
    } else {
        tracing::info!("Sentence model not installed, skipping semantic similarity");
    }

    let report = tokio::task::spawn_blocking(move || {
        evaluator.evaluate_files(&captions, &references)
    })
    .await??;

    let output_path = match &args.output {
        Some(path) => path.clone(),
        None => config
            .output_dir()
            .join(format!("evaluation_{}.json", timestamp())),
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output_path, serde_json::to_string_pretty(&report)?)?;
    tracing::info!("Report written to {:?}", output_path);

    print_report(&report, &output_path);
    Ok(())
}

/// `--input`, else `environment.captions_file`, else the newest captions file
/// in the output directory.
fn captions_file(input: Option<&str>, config: &Config) -> anyhow::Result<PathBuf> {
    let path = match input
        .map(PathBuf::from)
        .or_else(|| config.environment.captions_file.clone())
    {
        Some(path) => path,
        None => latest_captions(&config.output_dir()).ok_or_else(|| {
            anyhow::anyhow!(
                "No captions found in {:?}.\n\n  Hint: Run `glimpse run --proc APPLY` first or pass --input.",
                config.output_dir()
            )
        })?,
    };
    if !path.exists() {
        anyhow::bail!("Captions file does not exist: {:?}", path);
    }
    Ok(path)
}

/// Timestamped names sort chronologically.
fn latest_captions(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            name.starts_with("captions_") && (name.ends_with(".jsonl") || name.ends_with(".json"))
        })
        .max_by(|a, b| a.file_name().cmp(&b.file_name()))
}

fn print_report(report: &EvaluationReport, output: &Path) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("              Evaluation");
    eprintln!("  ====================================");
    eprintln!("    Captions:     {:>8}", report.images);
    for (n, score) in report.bleu.iter().enumerate() {
        eprintln!("    BLEU-{}:       {:>8.4}", n + 1, score);
    }
    eprintln!("    ROUGE-L:      {:>8.4}", report.rouge_l);
    eprintln!("    CIDEr-D:      {:>8.4}", report.cider);
    if let Some(semantic) = report.semantic {
        eprintln!("    Semantic:     {:>8.4}", semantic);
    }
    eprintln!("  ====================================");
    eprintln!("    Output: {}", output.display());
}
