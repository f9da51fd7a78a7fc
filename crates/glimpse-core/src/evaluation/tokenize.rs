//! Caption tokenization and n-gram counting shared by the metrics.

use std::collections::HashMap;

/// Lowercase, split on anything that is not a letter or digit.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Counts of every contiguous `n`-gram.
pub fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(
            tokenize("¡Vista del Puerto, en 1990!"),
            vec!["vista", "del", "puerto", "en", "1990"]
        );
        assert!(tokenize(" ... ").is_empty());
    }

    #[test]
    fn test_ngram_counts() {
        let tokens = tokenize("a b a b");
        let bigrams = ngram_counts(&tokens, 2);
        assert_eq!(bigrams.len(), 2);
        let ab = ["a".to_string(), "b".to_string()];
        assert_eq!(bigrams[&ab[..]], 2);
        assert!(ngram_counts(&tokens, 5).is_empty());
    }
}
