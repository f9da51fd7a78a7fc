//! The `glimpse run` command: MODEL, APPLY, and EVAL modes.

mod apply;
mod eval;
mod features;
pub mod types;

pub use types::{ModelChoice, OutputFormat, Proc};

use std::path::PathBuf;

use clap::Args;
use glimpse_core::{CaptionModel, Config, Device};

/// Arguments for the `run` command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Pipeline mode (defaults to defaults.proc)
    #[arg(short, long = "proc", value_enum, ignore_case = true)]
    pub proc: Option<Proc>,

    /// Caption model (defaults to defaults.model)
    #[arg(short, long, value_enum, ignore_case = true)]
    pub model: Option<ModelChoice>,

    /// Images (MODEL/APPLY) or captions file (EVAL). APPLY accepts a
    /// separator-joined list of paths and URLs.
    #[arg(short, long)]
    pub input: Option<String>,

    /// Output file (defaults to a timestamped file in output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Caption output format (defaults to defaults.output_format)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Document mined for caption context (defaults to environment.context_document)
    #[arg(long)]
    pub context_doc: Option<PathBuf>,

    /// Caption without document context
    #[arg(long, conflicts_with = "context_doc")]
    pub no_context: bool,
}

/// Execute the run command on an already bootstrapped device.
pub async fn execute(args: RunArgs, config: Config, device: Device) -> anyhow::Result<()> {
    tracing::info!("********** STARTING Main Image Caption Process **********");

    let proc = resolve_proc(args.proc, &config)?;
    let model = resolve_model(args.model, &config)?;
    tracing::info!("Mode: {proc}");

    match proc {
        Proc::Model => features::run(&args, &config, device).await?,
        Proc::Apply => apply::run(&args, &config, model, device).await?,
        Proc::Eval => eval::run(&args, &config, device).await?,
    }

    tracing::info!("********** PROCESS COMPLETED **********");
    Ok(())
}

fn resolve_proc(arg: Option<Proc>, config: &Config) -> anyhow::Result<Proc> {
    match arg {
        Some(proc) => Ok(proc),
        None => Proc::parse(&config.defaults.proc).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown mode {:?} in defaults.proc. Expected MODEL, APPLY, or EVAL.",
                config.defaults.proc
            )
        }),
    }
}

fn resolve_model(arg: Option<ModelChoice>, config: &Config) -> anyhow::Result<CaptionModel> {
    match arg {
        Some(choice) => Ok(choice.into()),
        None => config.defaults.model.parse::<CaptionModel>().map_err(|e| {
            anyhow::anyhow!("Invalid defaults.model {:?}: {e}", config.defaults.model)
        }),
    }
}

/// Caption output format: `--format`, else `defaults.output_format`.
pub(crate) fn resolve_format(
    arg: Option<OutputFormat>,
    config: &Config,
) -> anyhow::Result<glimpse_core::OutputFormat> {
    match arg {
        Some(format) => Ok(format.into()),
        None => glimpse_core::OutputFormat::parse(&config.defaults.output_format).ok_or_else(
            || {
                anyhow::anyhow!(
                    "Unknown output format {:?} in defaults.output_format",
                    config.defaults.output_format
                )
            },
        ),
    }
}

/// Create a progress bar for a per-image loop.
pub(crate) fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after a per-image loop.
pub(crate) fn print_summary(
    label: &str,
    succeeded: usize,
    failed: usize,
    elapsed: std::time::Duration,
    output: &std::path::Path,
) {
    let total = succeeded + failed;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        succeeded as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("    {label:^32}");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", succeeded);
    if failed > 0 {
        eprintln!("    Failed:       {:>8}", failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
    eprintln!("    Output: {}", output.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proc_defaults_to_config() {
        let mut config = Config::default();
        config.defaults.proc = "eval".to_string();
        assert_eq!(resolve_proc(None, &config).unwrap(), Proc::Eval);
        assert_eq!(resolve_proc(Some(Proc::Model), &config).unwrap(), Proc::Model);
    }

    #[test]
    fn test_unknown_proc_is_an_error() {
        let mut config = Config::default();
        config.defaults.proc = "TRAIN".to_string();
        assert!(resolve_proc(None, &config).is_err());
    }

    #[test]
    fn test_model_defaults_to_config() {
        let config = Config::default();
        assert_eq!(resolve_model(None, &config).unwrap(), CaptionModel::Llava);
        assert_eq!(
            resolve_model(Some(ModelChoice::Mistral), &config).unwrap(),
            CaptionModel::Mistral
        );
    }

    #[test]
    fn test_format_defaults_to_config() {
        let mut config = Config::default();
        assert_eq!(
            resolve_format(None, &config).unwrap(),
            glimpse_core::OutputFormat::JsonLines
        );
        config.defaults.output_format = "json".to_string();
        assert_eq!(
            resolve_format(None, &config).unwrap(),
            glimpse_core::OutputFormat::Json
        );
        config.defaults.output_format = "xml".to_string();
        assert!(resolve_format(None, &config).is_err());
        assert_eq!(
            resolve_format(Some(OutputFormat::Json), &config).unwrap(),
            glimpse_core::OutputFormat::Json
        );
    }
}
