//! Rule-based sentence segmentation.
//!
//! Blank lines always end a sentence. Inside a block, a run of terminators
//! (`.`, `!`, `?`, `…`) plus closing quotes or brackets ends a sentence when it
//! is followed by whitespace and a character that can open one: an uppercase
//! letter, a digit, an opening quote or bracket, or Spanish `¿`/`¡`. A period
//! after a known abbreviation or a single-letter initial does not.

use std::collections::HashSet;

use crate::config::ContextConfig;

const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '…'];
const CLOSERS: [char; 7] = ['"', '\'', ')', ']', '»', '”', '’'];
const OPENERS: [char; 8] = ['"', '\'', '(', '[', '«', '“', '¿', '¡'];

/// Splits text into ordered, trimmed, non-empty sentences.
#[derive(Debug, Clone, Default)]
pub struct SentenceSegmenter {
    abbreviations: HashSet<String>,
}

impl SentenceSegmenter {
    pub fn new<S: AsRef<str>>(abbreviations: &[S]) -> Self {
        Self {
            abbreviations: abbreviations
                .iter()
                .map(|a| a.as_ref().trim_end_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(&config.abbreviations)
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        for block in blocks(text) {
            self.split_block(&block, &mut sentences);
        }
        sentences
    }

    fn split_block(&self, block: &str, out: &mut Vec<String>) {
        let chars: Vec<(usize, char)> = block.char_indices().collect();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < chars.len() {
            let (pos, c) = chars[i];
            if !SENTENCE_TERMINATORS.contains(&c) {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < chars.len()
                && (SENTENCE_TERMINATORS.contains(&chars[j].1) || CLOSERS.contains(&chars[j].1))
            {
                j += 1;
            }

            if j < chars.len() && chars[j].1.is_whitespace() {
                let mut k = j;
                while k < chars.len() && chars[k].1.is_whitespace() {
                    k += 1;
                }
                let opens = k < chars.len() && can_open_sentence(chars[k].1);
                let abbreviated =
                    c == '.' && j == i + 1 && self.ends_with_abbreviation(&block[start..pos]);
                if opens && !abbreviated {
                    push_trimmed(&block[start..chars[j].0], out);
                    start = chars[k].0;
                    i = k;
                    continue;
                }
            }
            i = j;
        }

        push_trimmed(&block[start..], out);
    }

    fn ends_with_abbreviation(&self, preceding: &str) -> bool {
        let word = preceding
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() {
            return false;
        }
        let mut letters = word.chars();
        let is_initial =
            matches!((letters.next(), letters.next()), (Some(c), None) if c.is_alphabetic());
        is_initial || self.abbreviations.contains(&word.to_lowercase())
    }
}

/// Blank-line separated blocks, each with its lines rejoined.
fn blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

fn can_open_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_ascii_digit() || OPENERS.contains(&c)
}

fn push_trimmed(sentence: &str, out: &mut Vec<String>) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> SentenceSegmenter {
        SentenceSegmenter::from_config(&ContextConfig::default())
    }

    #[test]
    fn test_split_basic_sentences() {
        let s = segmenter()
            .split("La planta abrió en 1950. Fue destruida en 1980! ¿Quién la reconstruyó?");
        assert_eq!(
            s,
            vec![
                "La planta abrió en 1950.",
                "Fue destruida en 1980!",
                "¿Quién la reconstruyó?",
            ]
        );
    }

    #[test]
    fn test_blank_lines_are_hard_breaks() {
        let s = segmenter().split("Título sin punto\n\nPrimer párrafo.\nsigue aquí");
        assert_eq!(s, vec!["Título sin punto", "Primer párrafo.\nsigue aquí"]);
    }

    #[test]
    fn test_abbreviations_and_initials_do_not_split() {
        let s = segmenter().split("El Dr. Pérez y J. García visitaron la obra. Todo bien.");
        assert_eq!(
            s,
            vec!["El Dr. Pérez y J. García visitaron la obra.", "Todo bien."]
        );
    }

    #[test]
    fn test_lowercase_after_period_does_not_split() {
        let s = segmenter().split("Costó 3.5 millones. etc. y más");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        let s = segmenter().split("Dijo \"basta.\" Luego se fue.");
        assert_eq!(s, vec!["Dijo \"basta.\"", "Luego se fue."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(segmenter().split("  \n\n \n").is_empty());
    }
}
