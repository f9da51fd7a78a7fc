//! CIDEr-D: TF-IDF weighted n-gram cosine with clipping and a Gaussian
//! length penalty, scaled by 10.
//!
//! Document frequencies come from the reference sets, one document per image.

use std::collections::{HashMap, HashSet};

use super::tokenize::ngram_counts;

pub const MAX_ORDER: usize = 4;
pub const DEFAULT_SIGMA: f64 = 6.0;

struct TfIdf<'a> {
    weights: [HashMap<&'a [String], f64>; MAX_ORDER],
    norms: [f64; MAX_ORDER],
    len: usize,
}

/// CIDEr-D scorer bound to a reference corpus.
pub struct CiderD {
    doc_freq: HashMap<Vec<String>, f64>,
    log_ref_len: f64,
    sigma: f64,
}

impl CiderD {
    /// Build document frequencies from every image's tokenized references.
    pub fn new(corpus: &[Vec<Vec<String>>]) -> Self {
        let mut doc_freq: HashMap<Vec<String>, f64> = HashMap::new();
        for refs in corpus {
            let mut seen: HashSet<&[String]> = HashSet::new();
            for r in refs {
                for n in 1..=MAX_ORDER {
                    seen.extend(ngram_counts(r, n).into_keys());
                }
            }
            for gram in seen {
                *doc_freq.entry(gram.to_vec()).or_insert(0.0) += 1.0;
            }
        }
        Self {
            doc_freq,
            log_ref_len: (corpus.len().max(1) as f64).ln(),
            sigma: DEFAULT_SIGMA,
        }
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// CIDEr-D of one caption against its references.
    pub fn score(&self, hyp: &[String], refs: &[Vec<String>]) -> f64 {
        if refs.is_empty() {
            return 0.0;
        }
        let hyp_vec = self.tf_idf(hyp);
        let total: f64 = refs
            .iter()
            .map(|r| self.similarity(&hyp_vec, &self.tf_idf(r)).iter().sum::<f64>())
            .sum();
        total / MAX_ORDER as f64 / refs.len() as f64 * 10.0
    }

    fn tf_idf<'a>(&self, tokens: &'a [String]) -> TfIdf<'a> {
        let mut weights: [HashMap<&'a [String], f64>; MAX_ORDER] = Default::default();
        let mut norms = [0.0; MAX_ORDER];
        for n in 0..MAX_ORDER {
            for (gram, tf) in ngram_counts(tokens, n + 1) {
                let df = self.doc_freq.get(gram).copied().unwrap_or(0.0).max(1.0);
                let w = tf as f64 * (self.log_ref_len - df.ln());
                norms[n] += w * w;
                weights[n].insert(gram, w);
            }
            norms[n] = norms[n].sqrt();
        }
        TfIdf {
            weights,
            norms,
            len: tokens.len(),
        }
    }

    fn similarity(&self, hyp: &TfIdf<'_>, reference: &TfIdf<'_>) -> [f64; MAX_ORDER] {
        let delta = hyp.len as f64 - reference.len as f64;
        let penalty = (-(delta * delta) / (2.0 * self.sigma * self.sigma)).exp();
        let mut out = [0.0; MAX_ORDER];
        for n in 0..MAX_ORDER {
            let mut val = 0.0;
            for (gram, &h) in &hyp.weights[n] {
                let r = reference.weights[n].get(gram).copied().unwrap_or(0.0);
                // Clipping: hypothesis weight never exceeds the reference's.
                val += h.min(r) * r;
            }
            if hyp.norms[n] != 0.0 && reference.norms[n] != 0.0 {
                val /= hyp.norms[n] * reference.norms[n];
            }
            out[n] = val * penalty;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::tokenize::tokenize;

    fn corpus(sets: &[&[&str]]) -> Vec<Vec<Vec<String>>> {
        sets.iter()
            .map(|refs| refs.iter().map(|r| tokenize(r)).collect())
            .collect()
    }

    fn sample() -> Vec<Vec<Vec<String>>> {
        corpus(&[
            &["a red boat in the harbour", "a boat moored in a harbour"],
            &["people walking in the market", "a busy market square"],
            &["a stone tower at night", "the old tower lit at night"],
        ])
    }

    #[test]
    fn test_matching_caption_scores_higher() {
        let refs = sample();
        let cider = CiderD::new(&refs);
        let good = cider.score(&tokenize("a red boat in the harbour"), &refs[0]);
        let bad = cider.score(&tokenize("a busy market square"), &refs[0]);
        assert!(good > 0.0);
        assert!(good > bad);
    }

    #[test]
    fn test_disjoint_caption_scores_zero() {
        let refs = sample();
        let cider = CiderD::new(&refs);
        assert_eq!(cider.score(&tokenize("zebra giraffe"), &refs[2]), 0.0);
        assert_eq!(cider.score(&tokenize("tower"), &[]), 0.0);
    }

    #[test]
    fn test_length_penalty() {
        let refs = sample();
        let cider = CiderD::new(&refs);
        let exact = cider.score(&tokenize("a stone tower at night"), &refs[2]);
        let padded = cider.score(
            &tokenize("a stone tower at night a stone tower at night a stone tower at night"),
            &refs[2],
        );
        assert!(exact > padded);
    }

    #[test]
    fn test_document_frequency_counts_images_once() {
        let refs = corpus(&[&["a a a", "a b"], &["a c"]]);
        let cider = CiderD::new(&refs);
        assert_eq!(cider.doc_freq[&vec!["a".to_string()]], 2.0);
        assert_eq!(cider.doc_freq[&vec!["b".to_string()]], 1.0);
    }
}
