//! Part-of-speech tagging.
//!
//! Context retrieval only needs to tell nouns and proper nouns apart from
//! everything else, so the shipped tagger is a closed-class lexicon plus word
//! shape rules. Other taggers plug in through `PosTagger`.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::LexiconConfig;

/// Universal part-of-speech tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PosTag {
    Noun,
    PropN,
    Verb,
    Adj,
    Adv,
    Det,
    Adp,
    Pron,
    Conj,
    Num,
    Punct,
    Other,
}

impl PosTag {
    /// Nouns and proper nouns.
    pub fn is_nominal(self) -> bool {
        matches!(self, PosTag::Noun | PosTag::PropN)
    }
}

/// A token with its surface text and tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedToken {
    pub text: String,
    pub tag: PosTag,
}

/// Tags every token of a text, in order.
pub trait PosTagger: Send + Sync {
    fn tag(&self, text: &str) -> Vec<TaggedToken>;
}

/// Lexicon and word-shape tagger.
#[derive(Debug, Clone)]
pub struct LexiconTagger {
    determiners: HashSet<String>,
    prepositions: HashSet<String>,
    pronouns: HashSet<String>,
    conjunctions: HashSet<String>,
    verbs: HashSet<String>,
    adverbs: HashSet<String>,
    adjectives: HashSet<String>,
    nouns: HashSet<String>,
    adjective_suffixes: Vec<String>,
    verb_suffixes: Vec<String>,
}

impl LexiconTagger {
    pub fn new(lexicon: &LexiconConfig) -> Self {
        let set = |words: &[String]| words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            determiners: set(&lexicon.determiners),
            prepositions: set(&lexicon.prepositions),
            pronouns: set(&lexicon.pronouns),
            conjunctions: set(&lexicon.conjunctions),
            verbs: set(&lexicon.verbs),
            adverbs: set(&lexicon.adverbs),
            adjectives: set(&lexicon.adjectives),
            nouns: set(&lexicon.nouns),
            adjective_suffixes: lexicon.adjective_suffixes.clone(),
            verb_suffixes: lexicon.verb_suffixes.clone(),
        }
    }

    fn tag_word(&self, word: &str, sentence_initial: bool) -> PosTag {
        if word.chars().all(|c| c.is_numeric() || c == '.' || c == ',') {
            return PosTag::Num;
        }
        if !word.chars().any(char::is_alphabetic) {
            return PosTag::Other;
        }

        let lower = word.to_lowercase();
        if self.determiners.contains(&lower) {
            return PosTag::Det;
        }
        if self.prepositions.contains(&lower) {
            return PosTag::Adp;
        }
        if self.pronouns.contains(&lower) {
            return PosTag::Pron;
        }
        if self.conjunctions.contains(&lower) {
            return PosTag::Conj;
        }

        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        if is_acronym(word) || (capitalized && !sentence_initial) {
            return PosTag::PropN;
        }

        if self.verbs.contains(&lower) {
            return PosTag::Verb;
        }
        if self.adverbs.contains(&lower) {
            return PosTag::Adv;
        }
        if self.adjectives.contains(&lower) {
            return PosTag::Adj;
        }
        if self.nouns.contains(&lower) {
            return PosTag::Noun;
        }
        if has_suffix(&lower, &self.verb_suffixes) {
            return PosTag::Verb;
        }
        if has_suffix(&lower, &self.adjective_suffixes) {
            return PosTag::Adj;
        }
        PosTag::Noun
    }
}

impl PosTagger for LexiconTagger {
    fn tag(&self, text: &str) -> Vec<TaggedToken> {
        let mut sentence_initial = true;
        tokenize(text)
            .into_iter()
            .map(|token| {
                let tag = if token.chars().all(|c| !c.is_alphanumeric()) {
                    if token.chars().any(|c| ".!?¿¡:".contains(c)) {
                        sentence_initial = true;
                    }
                    PosTag::Punct
                } else {
                    let tag = self.tag_word(token, sentence_initial);
                    sentence_initial = false;
                    tag
                };
                TaggedToken {
                    text: token.to_string(),
                    tag,
                }
            })
            .collect()
    }
}

/// Split into word tokens (alphanumeric runs joined by inner `-` or `'`)
/// and single-character punctuation tokens.
fn tokenize(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if !c.is_alphanumeric() {
            let end = chars.get(i + 1).map_or(text.len(), |&(p, _)| p);
            tokens.push(&text[start..end]);
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() {
            let ch = chars[j].1;
            let joins = (ch == '-' || ch == '\'' || ch == '’')
                && chars.get(j + 1).is_some_and(|&(_, n)| n.is_alphanumeric());
            if ch.is_alphanumeric() || joins {
                j += 1;
            } else {
                break;
            }
        }
        let end = chars.get(j).map_or(text.len(), |&(p, _)| p);
        tokens.push(&text[start..end]);
        i = j;
    }
    tokens
}

fn is_acronym(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

fn has_suffix(word: &str, suffixes: &[String]) -> bool {
    suffixes
        .iter()
        .any(|s| word.len() > s.len() + 1 && word.ends_with(s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagger() -> LexiconTagger {
        LexiconTagger::new(&LexiconConfig::default())
    }

    fn tags(text: &str) -> Vec<(String, PosTag)> {
        tagger()
            .tag(text)
            .into_iter()
            .map(|t| (t.text, t.tag))
            .collect()
    }

    #[test]
    fn test_tokenize_keeps_hyphenated_words() {
        assert_eq!(
            tokenize("post-war (1945), l'usine"),
            vec!["post-war", "(", "1945", ")", ",", "l'usine"]
        );
    }

    #[test]
    fn test_spanish_title() {
        let tagged = tags("Reconstrucción de la planta de Valencia");
        assert_eq!(
            tagged,
            vec![
                ("Reconstrucción".to_string(), PosTag::Noun),
                ("de".to_string(), PosTag::Adp),
                ("la".to_string(), PosTag::Det),
                ("planta".to_string(), PosTag::Noun),
                ("de".to_string(), PosTag::Adp),
                ("Valencia".to_string(), PosTag::PropN),
            ]
        );
    }

    #[test]
    fn test_acronyms_numbers_and_punctuation() {
        let tagged = tags("Fábrica SEAT en 1953.");
        assert_eq!(tagged[0].1, PosTag::Noun);
        assert_eq!(tagged[1].1, PosTag::PropN);
        assert_eq!(tagged[2].1, PosTag::Adp);
        assert_eq!(tagged[3].1, PosTag::Num);
        assert_eq!(tagged[4].1, PosTag::Punct);
    }

    #[test]
    fn test_sentence_initial_resets_after_period() {
        let tagged = tags("Vista aérea. Puente nuevo");
        let puente = tagged.iter().find(|(t, _)| t == "Puente").unwrap();
        assert_eq!(puente.1, PosTag::Noun);
        let nuevo = tagged.iter().find(|(t, _)| t == "nuevo").unwrap();
        assert_eq!(nuevo.1, PosTag::Adj);
    }

    #[test]
    fn test_suffix_rules() {
        let tagged = tags("they were walking and singing, famous and cheerful");
        assert_eq!(tagged[2].1, PosTag::Verb);
        assert_eq!(tagged[4].1, PosTag::Verb);
        assert_eq!(tagged[6].1, PosTag::Adj);
        assert_eq!(tagged[8].1, PosTag::Adj);

        let tagged = tags("los pescadores siguen trabajando");
        assert_eq!(tagged[3].1, PosTag::Verb);
    }

    #[test]
    fn test_suffix_lookalike_nouns() {
        let tagged = tags("the building faces the morning sun");
        assert_eq!(tagged[1], ("building".to_string(), PosTag::Noun));
        assert_eq!(tagged[4], ("morning".to_string(), PosTag::Noun));

        let tagged = tags("un remiendo en la vela");
        assert_eq!(tagged[1].1, PosTag::Noun);
    }

    #[test]
    fn test_noun_exceptions_come_from_config() {
        let tagger = LexiconTagger::new(&LexiconConfig {
            nouns: Vec::new(),
            ..LexiconConfig::default()
        });
        let tagged = tagger.tag("the building");
        assert_eq!(tagged[1].tag, PosTag::Verb);
    }

    #[test]
    fn test_is_nominal() {
        assert!(PosTag::Noun.is_nominal());
        assert!(PosTag::PropN.is_nominal());
        assert!(!PosTag::Verb.is_nominal());
    }
}
