//! Image titles: looked up in a JSON map or derived from the file name.

use std::collections::HashMap;
use std::path::Path;

use crate::error::PipelineError;

/// Titles keyed by image name (with or without extension).
#[derive(Debug, Clone, Default)]
pub struct Titles {
    map: HashMap<String, String>,
}

impl Titles {
    /// Load a JSON object `{ "name": "title", ... }`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Document {
            path: path.to_path_buf(),
            message: format!("Failed to read titles: {e}"),
        })?;
        let map = serde_json::from_str(&content).map_err(|e| PipelineError::Document {
            path: path.to_path_buf(),
            message: format!("Titles must be a JSON object of name to title: {e}"),
        })?;
        Ok(Self { map })
    }

    /// Load `path` if given, else an empty map.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Title for an image name: exact match, then stem match, then the stem
    /// with `_` and `-` read as spaces.
    pub fn title_for(&self, name: &str) -> String {
        let stem = file_stem(name);
        self.map
            .get(name)
            .or_else(|| self.map.get(stem))
            .cloned()
            .unwrap_or_else(|| title_from_stem(stem))
    }
}

impl From<HashMap<String, String>> for Titles {
    fn from(map: HashMap<String, String>) -> Self {
        Self { map }
    }
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

fn title_from_stem(stem: &str) -> String {
    stem.split(['_', '-'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
