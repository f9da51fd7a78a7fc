//! CLI enum types for the run command: pipeline mode, caption model, output format.

use clap::ValueEnum;
use glimpse_core::CaptionModel;

/// Pipeline mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Proc {
    /// Extract visual features
    Model,
    /// Generate captions
    Apply,
    /// Score captions against references
    Eval,
}

impl Proc {
    /// Parse a `defaults.proc` value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "MODEL" => Some(Proc::Model),
            "APPLY" => Some(Proc::Apply),
            "EVAL" => Some(Proc::Eval),
            _ => None,
        }
    }
}

impl std::fmt::Display for Proc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Proc::Model => write!(f, "MODEL"),
            Proc::Apply => write!(f, "APPLY"),
            Proc::Eval => write!(f, "EVAL"),
        }
    }
}

/// Caption model selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    /// LLaMA-2 (text only)
    #[value(name = "LLM", alias = "llm")]
    Llm,
    /// Mistral (text only)
    #[value(name = "MISTRAL", alias = "mistral")]
    Mistral,
    /// LLaVA (vision-language)
    #[value(name = "LLaVA", alias = "llava", alias = "LLAVA")]
    Llava,
}

impl From<ModelChoice> for CaptionModel {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Llm => CaptionModel::Llm,
            ModelChoice::Mistral => CaptionModel::Mistral,
            ModelChoice::Llava => CaptionModel::Llava,
        }
    }
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for glimpse_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => glimpse_core::OutputFormat::Json,
            OutputFormat::Jsonl => glimpse_core::OutputFormat::JsonLines,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proc_parse_is_case_insensitive() {
        assert_eq!(Proc::parse("apply"), Some(Proc::Apply));
        assert_eq!(Proc::parse(" MODEL "), Some(Proc::Model));
        assert_eq!(Proc::parse("Eval"), Some(Proc::Eval));
        assert_eq!(Proc::parse("TRAIN"), None);
    }

    #[test]
    fn test_value_enum_names() {
        assert_eq!(Proc::from_str("APPLY", false).unwrap(), Proc::Apply);
        assert_eq!(ModelChoice::from_str("LLaVA", false).unwrap(), ModelChoice::Llava);
        assert_eq!(ModelChoice::from_str("mistral", false).unwrap(), ModelChoice::Mistral);
    }

    #[test]
    fn test_model_choice_maps_to_caption_model() {
        assert_eq!(CaptionModel::from(ModelChoice::Llm), CaptionModel::Llm);
        assert!(CaptionModel::from(ModelChoice::Llava).accepts_images());
    }

    #[test]
    fn test_output_format_maps_to_core() {
        assert_eq!(
            glimpse_core::OutputFormat::from(OutputFormat::Jsonl),
            glimpse_core::OutputFormat::JsonLines
        );
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
