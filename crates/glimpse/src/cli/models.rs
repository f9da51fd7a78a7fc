//! The `glimpse models` command for managing ONNX models.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use glimpse_core::embedding::sentence::{SENTENCE_MODEL_FILENAME, TOKENIZER_FILENAME};
use glimpse_core::{Config, FeatureEncoder, SentenceEncoder};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the feature encoder, sentence encoder, and tokenizer
    Download,

    /// List installed models
    List,

    /// Show model directory path
    Path,
}

/// One file fetched from the model hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    pub label: &'static str,
    pub url: String,
    pub dest: PathBuf,
}

/// Every file the pipeline needs, with its hub URL and local destination.
pub fn download_plan(config: &Config) -> Vec<ModelFile> {
    let hub = config.models.hub.endpoint.trim_end_matches('/');
    let model_dir = config.model_dir();
    let feature = &config.models.feature;
    let sentence = &config.models.sentence;
    let sentence_dir = SentenceEncoder::model_path(sentence, &model_dir);

    vec![
        ModelFile {
            label: "feature encoder",
            url: format!("{hub}/{}/resolve/main/{}", feature.repo, feature.remote_path),
            dest: FeatureEncoder::model_path(feature, &model_dir),
        },
        ModelFile {
            label: "sentence encoder",
            url: format!("{hub}/{}/resolve/main/{}", sentence.repo, sentence.remote_path),
            dest: sentence_dir.join(SENTENCE_MODEL_FILENAME),
        },
        ModelFile {
            label: "tokenizer",
            url: format!("{hub}/{}/resolve/main/{}", sentence.repo, TOKENIZER_FILENAME),
            dest: sentence_dir.join(TOKENIZER_FILENAME),
        },
    ]
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download => {
            let client = reqwest::Client::new();
            let token = config.hub_token();

            for file in download_plan(&config) {
                if file.dest.exists() {
                    tracing::info!("{} already exists at {:?}", file.label, file.dest);
                    continue;
                }
                if let Some(parent) = file.dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                tracing::info!("Downloading {}...", file.label);
                tracing::info!("  Source: {}", file.url);
                tracing::info!("  Destination: {:?}", file.dest);
                download_file(&client, &file.url, &file.dest, token.as_deref()).await?;

                let file_size = std::fs::metadata(&file.dest)?.len();
                tracing::info!(
                    "  {} complete ({:.1} MB)",
                    file.label,
                    file_size as f64 / (1024.0 * 1024.0)
                );
            }

            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            if !model_dir.exists() {
                println!("No models installed.");
                println!("Run `glimpse models download` to download required models.");
                return Ok(());
            }

            println!("Installed models:");
            println!("  Directory: {}\n", model_dir.display());
            for file in download_plan(&config) {
                let status = if file.dest.exists() {
                    "ready"
                } else {
                    "not installed"
                };
                let relative = file.dest.strip_prefix(&model_dir).unwrap_or(&file.dest);
                println!(
                    "  - {:18} {:40} {}",
                    file.label,
                    relative.display().to_string(),
                    status
                );
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

/// Stream a file to disk.
///
/// The body is written to `<dest>.part` and renamed once complete, so an
/// interrupted download never leaves a truncated model behind.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    token: Option<&str>,
) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }
    file.flush().await?;
    drop(file);

    if let Some(total) = total_size {
        if downloaded != total {
            let _ = std::fs::remove_file(&partial);
            anyhow::bail!(
                "Incomplete download of {url}: got {downloaded} of {total} bytes. Try again."
            );
        }
    }

    std::fs::rename(&partial, dest)?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_uses_hub_resolve_urls() {
        let mut config = Config::default();
        config.environment.model_dir = PathBuf::from("/models");
        let plan = download_plan(&config);

        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan[0].url,
            "https://huggingface.co/Xenova/clip-vit-large-patch14/resolve/main/onnx/vision_model.onnx"
        );
        assert_eq!(plan[0].dest, PathBuf::from("/models/ViT-L-14/visual.onnx"));
        assert_eq!(
            plan[2].url,
            "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json"
        );
        assert_eq!(
            plan[2].dest,
            PathBuf::from("/models/all-MiniLM-L6-v2/tokenizer.json")
        );
    }

    #[test]
    fn plan_follows_hub_endpoint() {
        let mut config = Config::default();
        config.models.hub.endpoint = "https://hub.example.org/".to_string();
        let plan = download_plan(&config);
        assert!(plan
            .iter()
            .all(|f| f.url.starts_with("https://hub.example.org/")));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/m/visual.onnx")),
            PathBuf::from("/m/visual.onnx.part")
        );
    }
}
