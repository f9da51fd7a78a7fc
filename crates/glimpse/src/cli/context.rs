//! The `glimpse context` command: retrieve grounding context for a title.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use glimpse_core::{Config, ContextBuilder, Device, LexiconTagger, SentenceEncoder};

/// Arguments for the `context` command.
#[derive(Args, Debug)]
pub struct ContextArgs {
    /// DOCX or plain-text document to search
    pub document: PathBuf,

    /// Image title the context should support
    #[arg(short, long)]
    pub title: String,

    /// Maximum number of sentences to join (defaults to context.top_n)
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Cosine similarity threshold (defaults to context.threshold)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Also write the extracted document text here
    #[arg(long)]
    pub text_out: Option<PathBuf>,
}

/// Execute the context command.
pub async fn execute(args: ContextArgs, config: Config, device: Device) -> anyhow::Result<()> {
    if !args.document.exists() {
        anyhow::bail!("Document does not exist: {:?}", args.document);
    }
    let builder = load_builder(&config, device, args.text_out.clone())?;

    let top_n = args.top_n.unwrap_or(config.context.top_n);
    let threshold = args.threshold.unwrap_or(config.context.threshold);
    if top_n == 0 {
        anyhow::bail!("--top-n must be at least 1");
    }

    let document = args.document.clone();
    let title = args.title.clone();
    let result = tokio::task::spawn_blocking(move || {
        builder.build(&document, &title, top_n, threshold)
    })
    .await??;

    if result.context.is_none() {
        tracing::info!("No grounded context found for {:?}", args.title);
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Load the sentence encoder and assemble a context builder.
pub fn load_builder(
    config: &Config,
    device: Device,
    text_out: Option<PathBuf>,
) -> anyhow::Result<ContextBuilder> {
    let model_dir = config.model_dir();
    if !SentenceEncoder::model_exists(&config.models.sentence, &model_dir) {
        anyhow::bail!(
            "Sentence model not found at {:?}.\n\n  Hint: Run `glimpse models download` first.",
            SentenceEncoder::model_path(&config.models.sentence, &model_dir)
        );
    }

    let encoder = SentenceEncoder::load(&config.models.sentence, &model_dir, device)?;
    let builder = ContextBuilder::new(
        &config.context,
        Arc::new(encoder),
        Box::new(LexiconTagger::new(&config.context.lexicon)),
    )?
    .with_batch_size(config.models.sentence.batch_size)
    .with_text_output(text_out);
    Ok(builder)
}
