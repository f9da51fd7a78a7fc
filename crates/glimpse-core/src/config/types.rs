//! Sub-configuration structs with defaults for every section of `config.json`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations and accelerator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Canonical working directory, filled in when the config is loaded
    pub real_path: PathBuf,

    /// Root data directory
    pub data_dir: PathBuf,

    /// Directory scanned for input images
    pub images_dir: PathBuf,

    /// Directory receiving features, captions, and reports
    pub output_dir: PathBuf,

    /// Directory where ONNX models and tokenizers are stored
    pub model_dir: PathBuf,

    /// DOCX (or plain text) document mined for caption context
    pub context_document: Option<PathBuf>,

    /// Optional plain-text dump of the context document
    pub context_text_output: Option<PathBuf>,

    /// Optional JSON map of image name to title
    pub titles_file: Option<PathBuf>,

    /// Captions JSONL evaluated in EVAL mode (defaults to the latest APPLY output)
    pub captions_file: Option<PathBuf>,

    /// JSON map of image name to reference captions
    pub references_file: Option<PathBuf>,

    /// Accelerator process settings
    pub accelerator: AcceleratorConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            real_path: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            images_dir: PathBuf::from("data/images"),
            output_dir: PathBuf::from("data/output"),
            model_dir: PathBuf::from("~/.glimpse/models"),
            context_document: None,
            context_text_output: None,
            titles_file: None,
            captions_file: None,
            references_file: None,
            accelerator: AcceleratorConfig::default(),
        }
    }
}

/// Process-wide accelerator settings applied once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    /// Allocator configuration string exported for CUDA runtimes
    pub allocator_conf: String,

    /// Largest block the caching allocator may split, in MB
    pub max_split_size_mb: u32,

    /// Distributed rendezvous address placeholder
    pub master_addr: String,

    /// Distributed rendezvous port placeholder
    pub master_port: u16,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            allocator_conf: "expandable_segments:True".to_string(),
            max_split_size_mb: 64,
            master_addr: "localhost".to_string(),
            master_port: 12345,
        }
    }
}

/// Run defaults, overridable from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Pipeline mode: MODEL, APPLY, or EVAL
    pub proc: String,

    /// Caption model selector: LLM, MISTRAL, or LLaVA
    pub model: String,

    /// Device preference: auto, cuda, or cpu
    pub device: String,

    /// Model hub token (supports ${ENV_VAR} syntax)
    pub token: String,

    /// Output format for records ("json" or "jsonl")
    pub output_format: String,

    /// Separator for multi-image arguments
    pub image_separator: String,

    /// Max retry attempts for transient caption failures
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            proc: "APPLY".to_string(),
            model: "LLaVA".to_string(),
            device: "auto".to_string(),
            token: "${HF_TOKEN}".to_string(),
            output_format: "jsonl".to_string(),
            image_separator: ",".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Pretrained model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Visual feature encoder (MODEL mode)
    pub feature: FeatureModelConfig,

    /// Sentence embedding model (context retrieval, semantic evaluation)
    pub sentence: SentenceModelConfig,

    /// Model hub settings
    pub hub: HubConfig,

    /// LLaMA-2 caption backend
    pub llm: CaptionBackendConfig,

    /// Mistral caption backend
    pub mistral: CaptionBackendConfig,

    /// LLaVA caption backend
    pub llava: CaptionBackendConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            feature: FeatureModelConfig::default(),
            sentence: SentenceModelConfig::default(),
            hub: HubConfig::default(),
            llm: CaptionBackendConfig::ollama("llama2"),
            mistral: CaptionBackendConfig::ollama("mistral"),
            llava: CaptionBackendConfig::ollama("llava"),
        }
    }
}

/// CLIP-style visual encoder exported to ONNX.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureModelConfig {
    /// Local model name; the encoder lives at `{model_dir}/{name}/visual.onnx`
    pub name: String,

    /// Label of the pretraining dataset, recorded with every feature vector
    pub pretrained_dataset: String,

    /// Hub repository the encoder is downloaded from
    pub repo: String,

    /// File path inside the hub repository
    pub remote_path: String,

    /// Square input resolution
    pub image_size: u32,

    /// Images per inference call
    pub batch_size: usize,

    /// Preferred output tensor name
    pub output_name: String,
}

impl Default for FeatureModelConfig {
    fn default() -> Self {
        Self {
            name: "ViT-L-14".to_string(),
            pretrained_dataset: "openai".to_string(),
            repo: "Xenova/clip-vit-large-patch14".to_string(),
            remote_path: "onnx/vision_model.onnx".to_string(),
            image_size: 224,
            batch_size: 8,
            output_name: "image_embeds".to_string(),
        }
    }
}

/// Sentence-transformers model exported to ONNX.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentenceModelConfig {
    /// Local model name; files live at `{model_dir}/{name}/`
    pub name: String,

    /// Hub repository
    pub repo: String,

    /// ONNX file path inside the hub repository
    pub remote_path: String,

    /// Maximum tokens per input (longer inputs are truncated)
    pub max_length: usize,

    /// Texts per inference call
    pub batch_size: usize,
}

impl Default for SentenceModelConfig {
    fn default() -> Self {
        Self {
            name: "all-MiniLM-L6-v2".to_string(),
            repo: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            remote_path: "onnx/model.onnx".to_string(),
            max_length: 256,
            batch_size: 32,
        }
    }
}

/// Model hub endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub base URL (file downloads and token verification)
    pub endpoint: String,

    /// OpenAI-compatible inference router used by the `huggingface` backend
    pub router_endpoint: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
            router_endpoint: "https://router.huggingface.co/v1".to_string(),
        }
    }
}

/// One caption model and the server that hosts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionBackendConfig {
    /// Backend kind: "ollama", "huggingface", or "openai"
    pub backend: String,

    /// Backend base URL (ignored by the huggingface backend)
    pub endpoint: String,

    /// Model identifier on that backend
    pub model: String,

    /// API key (supports ${ENV_VAR} syntax; unused by ollama)
    pub api_key: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl CaptionBackendConfig {
    fn ollama(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Self::default()
        }
    }
}

impl Default for CaptionBackendConfig {
    fn default() -> Self {
        Self {
            backend: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            api_key: String::new(),
            max_tokens: 200,
            temperature: 0.2,
        }
    }
}

/// Context retrieval policy and the language data it relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum number of paragraphs joined into a context
    pub top_n: usize,

    /// Primary cosine similarity threshold
    pub threshold: f32,

    /// Best similarity required before the threshold is relaxed
    pub relax_floor: f32,

    /// Relaxed bound as a fraction of the best similarity
    pub relax_factor: f32,

    /// Trailing "de X" seed entity pattern (one capture group)
    pub seed_pattern: String,

    /// All-caps token pattern
    pub acronym_pattern: String,

    /// Non-alphabetic filler replaced by a space when cleaning context
    pub filler_pattern: String,

    /// Lowercase tokens never reported as subjects
    pub stop_words: Vec<String>,

    /// Tokens that end with a period without ending a sentence
    pub abbreviations: Vec<String>,

    /// Closed-class lexicon for part-of-speech tagging
    pub lexicon: LexiconConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            threshold: 0.5,
            relax_floor: 0.3,
            relax_factor: 0.8,
            seed_pattern: r"de ([A-ZÁÉÍÓÚÑ][a-záéíóúñ]*)$".to_string(),
            acronym_pattern: r"\b[A-ZÁÉÍÓÚÑ]{2,}\b".to_string(),
            filler_pattern: r"\b[^a-zA-ZáéíóúÁÉÍÓÚüÜñÑ]+\b".to_string(),
            stop_words: strings(&[
                "reconstrucción",
                "planta",
                "el",
                "la",
                "del",
                "de",
                "desde",
            ]),
            abbreviations: strings(&[
                "sr", "sra", "srta", "dr", "dra", "prof", "etc", "pág", "núm", "aprox", "av",
                "mr", "mrs", "ms", "st", "vs", "fig", "e.g", "i.e",
            ]),
            lexicon: LexiconConfig::default(),
        }
    }
}

/// Word lists for the lexicon tagger, all lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub determiners: Vec<String>,
    pub prepositions: Vec<String>,
    pub pronouns: Vec<String>,
    pub conjunctions: Vec<String>,
    pub verbs: Vec<String>,
    pub adverbs: Vec<String>,
    pub adjectives: Vec<String>,

    /// Nouns that would otherwise match a suffix rule
    pub nouns: Vec<String>,

    /// Suffixes marking adjectives when a word is not in the lexicon
    pub adjective_suffixes: Vec<String>,

    /// Suffixes marking verb forms when a word is not in the lexicon
    pub verb_suffixes: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            determiners: strings(&[
                "el", "la", "los", "las", "un", "una", "unos", "unas", "lo", "al", "este", "esta",
                "estos", "estas", "ese", "esa", "esos", "esas", "aquel", "aquella", "su", "sus",
                "mi", "mis", "tu", "tus", "the", "a", "an", "this", "that", "these", "those",
                "his", "her", "its", "their", "our", "my", "your", "some", "any", "each", "every",
            ]),
            prepositions: strings(&[
                "de", "del", "desde", "en", "con", "por", "para", "sin", "sobre", "entre", "hacia",
                "hasta", "tras", "ante", "bajo", "según", "durante", "mediante", "contra", "a",
                "of", "in", "on", "at", "by", "for", "with", "from", "to", "into", "onto", "over",
                "under", "after", "before", "during", "between", "through", "near",
            ]),
            pronouns: strings(&[
                "yo", "tú", "él", "ella", "ellos", "ellas", "nosotros", "vosotros", "usted",
                "ustedes", "se", "le", "les", "me", "te", "nos", "que", "quien", "cual", "i",
                "you", "he", "she", "it", "we", "they", "him", "them", "us", "who", "which",
                "what",
            ]),
            conjunctions: strings(&[
                "y", "e", "o", "u", "ni", "pero", "sino", "aunque", "porque", "si", "and", "or",
                "but", "nor", "because", "although", "if", "while",
            ]),
            verbs: strings(&[
                "es", "son", "era", "eran", "fue", "fueron", "ser", "está", "están", "estar", "ha",
                "han", "había", "hay", "tiene", "tienen", "hace", "muestra", "is", "are", "was",
                "were", "be", "been", "being", "has", "have", "had", "do", "does", "did", "shows",
                "builds", "built",
            ]),
            adverbs: strings(&[
                "no", "muy", "más", "menos", "también", "ya", "aquí", "allí", "hoy", "ayer", "not",
                "very", "more", "less", "also", "already", "here", "there", "today", "now",
            ]),
            adjectives: strings(&[
                "nuevo", "nueva", "viejo", "vieja", "antiguo", "antigua", "gran", "grande",
                "pequeño", "pequeña", "primer", "primera", "new", "old", "large", "small", "first",
            ]),
            nouns: strings(&[
                "building", "buildings", "painting", "paintings", "ceiling", "morning", "evening",
                "wedding", "meeting", "clothing", "spring", "string", "thing", "king", "ring",
                "comando", "contrabando", "bando", "estruendo", "remiendo", "dividendo",
            ]),
            adjective_suffixes: strings(&[
                "ous", "ful", "ive", "able", "ible", "ical", "oso", "osa", "osos", "osas",
            ]),
            verb_suffixes: strings(&["ando", "iendo", "ing"]),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image file size in megabytes (local files and downloads)
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Remote image fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,

    /// Caption generation timeout in milliseconds
    pub llm_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            fetch_timeout_ms: 30000,
            llm_timeout_ms: 120000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
