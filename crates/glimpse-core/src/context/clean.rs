//! Normalization of the joined context string.

use regex::Regex;

/// Separator placed between selected paragraphs.
pub const PARAGRAPH_SEPARATOR: &str = ". ";

/// Cleans joined paragraphs into a single-line context string.
#[derive(Debug, Clone)]
pub struct ContextCleaner {
    newlines: Regex,
    filler: Regex,
    whitespace: Regex,
}

impl ContextCleaner {
    pub fn new(filler_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            newlines: Regex::new(r"\n+")?,
            filler: Regex::new(filler_pattern)?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Join paragraphs with `". "` and clean the result.
    pub fn join(&self, paragraphs: &[&str]) -> String {
        self.clean(&paragraphs.join(PARAGRAPH_SEPARATOR))
    }

    /// Newline runs become a space, filler between word boundaries becomes a
    /// space (never deleted, so neighbouring words stay apart), whitespace runs
    /// collapse to one space, and the ends are trimmed.
    pub fn clean(&self, text: &str) -> String {
        let text = self.newlines.replace_all(text, " ");
        let text = self.filler.replace_all(text.trim(), " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}
