//! Title heuristics: seed entities, subjects, and the keyword list.
//!
//! Patterns and the stop-list are configuration data (`context.*`) so they
//! can be audited and swapped per language.

use std::collections::HashSet;

use regex::Regex;

use crate::config::ContextConfig;
use crate::error::ConfigError;
use crate::nlp::PosTagger;

/// Compiled title heuristics.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    pub seed: Regex,
    pub acronym: Regex,
    pub stop_words: HashSet<String>,
}

impl KeywordRules {
    pub fn from_config(config: &ContextConfig) -> Result<Self, ConfigError> {
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ConfigError::ValidationError(format!("context.{name}: {e}")))
        };
        Ok(Self {
            seed: compile("seed_pattern", &config.seed_pattern)?,
            acronym: compile("acronym_pattern", &config.acronym_pattern)?,
            stop_words: config.stop_words.iter().map(|w| w.to_lowercase()).collect(),
        })
    }
}

/// Entities named by a title.
///
/// A trailing "de X" match contributes X first. All-caps tokens follow, minus
/// the first occurrence, which is usually a heading. Duplicates are dropped.
pub fn extract_entities(title: &str, seed: &Regex, acronym: &Regex) -> Vec<String> {
    let seed_entity = seed.captures(title).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    });

    let caps_words = acronym
        .find_iter(title)
        .skip(1)
        .map(|m| m.as_str().to_string());

    dedup(seed_entity.into_iter().chain(caps_words))
}

/// Noun and proper-noun tokens of a title, minus stop words.
///
/// Order is kept and duplicates are not removed.
pub fn extract_subjects<T: PosTagger + ?Sized>(
    title: &str,
    tagger: &T,
    stop_words: &HashSet<String>,
) -> Vec<String> {
    tagger
        .tag(title)
        .into_iter()
        .filter(|token| token.tag.is_nominal())
        .filter(|token| !stop_words.contains(&token.text.to_lowercase()))
        .map(|token| token.text)
        .collect()
}

/// `[title] + entities + subjects`, first occurrence wins.
pub fn build_keywords(title: &str, entities: &[String], subjects: &[String]) -> Vec<String> {
    dedup(
        std::iter::once(title.to_string())
            .chain(entities.iter().cloned())
            .chain(subjects.iter().cloned()),
    )
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
