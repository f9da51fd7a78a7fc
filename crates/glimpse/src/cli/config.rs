//! The `glimpse config` command for configuration management.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use glimpse_core::Config;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show {
        /// Render as TOML instead of JSON
        #[arg(long)]
        toml: bool,
    },

    /// Show the config file path in use
    Path,

    /// Write a config file with defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(
    args: ConfigArgs,
    config: Config,
    explicit_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { toml } => {
            let rendered = if toml {
                config.to_toml()?
            } else {
                config.to_json()?
            };
            println!("{rendered}");
        }

        ConfigCommand::Path => {
            let path = explicit_path.unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            let path = explicit_path.unwrap_or_else(Config::user_path);
            let written = write_default(&path, force)?;
            tracing::info!("Config file created at: {}", written.display());
            println!("Configuration initialized at: {}", written.display());
        }
    }

    Ok(())
}

/// Write the default configuration to `path`, as TOML when the extension says
/// so and JSON otherwise.
fn write_default(path: &std::path::Path, force: bool) -> anyhow::Result<PathBuf> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = Config::default();
    let is_toml = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let content = if is_toml {
        config.to_toml()?
    } else {
        config.to_json()?
    };
    std::fs::write(path, content)?;
    Ok(path.to_path_buf())
}
