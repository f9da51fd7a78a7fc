//! Configuration management for Glimpse.
//!
//! Configuration is a JSON document with `environment`, `defaults`, and
//! `models` sections (plus optional `context`, `limits`, and `logging`). It is
//! loaded once at startup into a `Config` value that is passed explicitly to
//! every component. All config structs implement `Default`, so a partial file
//! only overrides what it names.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Root configuration structure for Glimpse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories, documents, and accelerator settings
    pub environment: EnvironmentConfig,

    /// Run defaults (mode, model, device, hub token)
    pub defaults: DefaultsConfig,

    /// Pretrained model settings
    pub models: ModelsConfig,

    /// Context retrieval policy
    pub context: ContextConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if no config file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            let mut config = Self::default();
            config.environment.real_path = working_dir();
            Ok(config)
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let mut config: Config = if is_toml {
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?
        } else {
            serde_json::from_str(&content)?
        };
        config.environment.real_path = working_dir();
        config.validate()?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Prefers `./config.json` in the working directory, then the platform
    /// config directory:
    /// - macOS: ~/Library/Application Support/com.glimpse.glimpse/config.json
    /// - Linux: ~/.config/glimpse/config.json
    /// - Windows: C:\Users\<User>\AppData\Roaming\glimpse\config\config.json
    pub fn default_path() -> PathBuf {
        let local = working_dir().join(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        Self::user_path()
    }

    /// Per-user config path, used by `config init`.
    pub fn user_path() -> PathBuf {
        directories::ProjectDirs::from("com", "glimpse", "glimpse")
            .map(|dirs| dirs.config_dir().to_path_buf().join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".glimpse").join(CONFIG_FILE_NAME)
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.environment.model_dir)
    }

    /// Get the resolved image directory path.
    pub fn images_dir(&self) -> PathBuf {
        expand(&self.environment.images_dir)
    }

    /// Get the resolved output directory path.
    pub fn output_dir(&self) -> PathBuf {
        expand(&self.environment.output_dir)
    }

    /// Model hub token: `defaults.token` (with `${VAR}` indirection), else `HF_TOKEN`.
    pub fn hub_token(&self) -> Option<String> {
        resolve_env_var(&self.defaults.token).or_else(|| std::env::var("HF_TOKEN").ok())
    }

    /// Serialize the config to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::TomlError(e.to_string()))
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

fn working_dir() -> PathBuf {
    std::env::current_dir()
        .and_then(|p| p.canonicalize())
        .unwrap_or_else(|_| PathBuf::from("."))
}
