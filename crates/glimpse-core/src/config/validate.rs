//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const PROC_MODES: &[&str] = &["MODEL", "APPLY", "EVAL"];
const MODEL_SELECTORS: &[&str] = &["LLM", "MISTRAL", "LLAVA"];
const DEVICES: &[&str] = &["auto", "cuda", "cpu"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PROC_MODES.contains(&self.defaults.proc.to_uppercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.proc must be one of MODEL, APPLY, EVAL (got {:?})",
                self.defaults.proc
            )));
        }
        if !MODEL_SELECTORS.contains(&self.defaults.model.to_uppercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.model must be one of LLM, MISTRAL, LLaVA (got {:?})",
                self.defaults.model
            )));
        }
        if !DEVICES.contains(&self.defaults.device.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(
                "defaults.device must be auto, cuda, or cpu".into(),
            ));
        }
        if self.models.feature.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "models.feature.image_size must be > 0".into(),
            ));
        }
        if self.models.feature.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "models.feature.batch_size must be > 0".into(),
            ));
        }
        if self.models.sentence.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "models.sentence.max_length must be > 0".into(),
            ));
        }
        if self.models.sentence.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "models.sentence.batch_size must be > 0".into(),
            ));
        }
        if self.context.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "context.top_n must be > 0".into(),
            ));
        }
        for (name, value) in [
            ("context.threshold", self.context.threshold),
            ("context.relax_floor", self.context.relax_floor),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between -1.0 and 1.0"
                )));
            }
        }
        if self.context.relax_factor <= 0.0 || self.context.relax_factor > 1.0 {
            return Err(ConfigError::ValidationError(
                "context.relax_factor must be in (0.0, 1.0]".into(),
            ));
        }
        for (name, pattern) in [
            ("context.seed_pattern", &self.context.seed_pattern),
            ("context.acronym_pattern", &self.context.acronym_pattern),
            ("context.filler_pattern", &self.context.filler_pattern),
        ] {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} is not a valid regex: {e}"
                )));
            }
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.fetch_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.llm_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.llm_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_mixed_case_selectors() {
        let mut config = Config::default();
        config.defaults.model = "llava".to_string();
        config.defaults.proc = "model".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_proc() {
        let mut config = Config::default();
        config.defaults.proc = "TRAIN".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("defaults.proc"));
    }

    #[test]
    fn test_validate_rejects_zero_sentence_batch() {
        let mut config = Config::default();
        config.models.sentence.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("models.sentence.batch_size"));
    }

    #[test]
    fn test_validate_rejects_zero_file_size_limit() {
        let mut config = Config::default();
        config.limits.max_file_size_mb = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_file_size_mb"));
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let mut config = Config::default();
        config.context.top_n = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("top_n"));
    }

    #[test]
    fn test_validate_rejects_relax_factor_out_of_range() {
        let mut config = Config::default();
        config.context.relax_factor = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("relax_factor"));

        config.context.relax_factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let mut config = Config::default();
        config.context.seed_pattern = "de ([A-Z".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("seed_pattern"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.llm_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("llm_timeout_ms"));
    }
}
