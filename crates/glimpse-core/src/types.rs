//! Records written by the MODEL and APPLY modes and read back by EVAL.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Visual embedding of one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// File name of the image
    pub name: String,

    /// Path to the source image
    pub image_path: PathBuf,

    /// Encoder name (e.g. "ViT-L-14")
    pub model: String,

    /// Dataset the encoder was pretrained on
    pub pretrained_dataset: String,

    /// L2-normalised embedding
    pub embedding: Vec<f32>,
}

/// A generated caption and the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionRecord {
    /// Image name (final path or URL segment)
    pub name: String,

    /// Path or URL of the image
    pub image: String,

    /// Title the caption was generated from
    pub title: String,

    /// Generated caption
    pub caption: String,

    /// Grounding context passed to the model, if any was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Keywords derived from the title
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Caption model selector ("LLM", "MISTRAL", "LLaVA")
    pub model: String,

    /// Backend that served the request
    pub backend: String,

    /// Backend round-trip latency
    #[serde(default)]
    pub latency_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,

    /// UTC generation time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_record_minimal_json() {
        let json = r#"{"name":"a.jpg","image":"a.jpg","title":"A","caption":"Una plaza.","model":"LLM","backend":"ollama"}"#;
        let record: CaptionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.caption, "Una plaza.");
        assert!(record.context.is_none());
        assert!(record.keywords.is_empty());
    }

    #[test]
    fn test_caption_record_skips_absent_context() {
        let record = CaptionRecord {
            name: "a.jpg".to_string(),
            image: "images/a.jpg".to_string(),
            title: "A".to_string(),
            caption: "Una plaza.".to_string(),
            context: None,
            keywords: vec!["A".to_string()],
            model: "LLaVA".to_string(),
            backend: "ollama".to_string(),
            latency_ms: 12,
            tokens_used: None,
            generated_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("context"));
        assert!(json.contains("\"keywords\":[\"A\"]"));
    }
}
