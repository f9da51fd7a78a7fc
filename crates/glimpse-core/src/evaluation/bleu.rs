//! Corpus BLEU-1..4 with clipped n-gram precision and a brevity penalty
//! against the closest reference length.

use super::tokenize::ngram_counts;

pub const MAX_ORDER: usize = 4;

/// Running BLEU statistics; add sentences, then read the scores.
#[derive(Debug, Default, Clone)]
pub struct BleuStats {
    matches: [usize; MAX_ORDER],
    totals: [usize; MAX_ORDER],
    hyp_len: usize,
    ref_len: usize,
}

impl BleuStats {
    pub fn add(&mut self, hyp: &[String], refs: &[Vec<String>]) {
        self.hyp_len += hyp.len();
        self.ref_len += closest_ref_len(hyp.len(), refs);

        for n in 1..=MAX_ORDER {
            let hyp_counts = ngram_counts(hyp, n);
            let ref_counts: Vec<_> = refs.iter().map(|r| ngram_counts(r, n)).collect();

            for (gram, count) in &hyp_counts {
                let max_ref = ref_counts
                    .iter()
                    .map(|c| c.get(gram).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                self.matches[n - 1] += (*count).min(max_ref);
            }
            self.totals[n - 1] += hyp.len().saturating_sub(n - 1);
        }
    }

    /// BLEU-1 through BLEU-4.
    pub fn scores(&self) -> [f64; MAX_ORDER] {
        let mut out = [0.0; MAX_ORDER];
        let bp = brevity_penalty(self.hyp_len, self.ref_len);
        let mut log_sum = 0.0;

        for n in 0..MAX_ORDER {
            if self.matches[n] == 0 || self.totals[n] == 0 {
                // Every higher order includes this zero precision.
                break;
            }
            log_sum += (self.matches[n] as f64 / self.totals[n] as f64).ln();
            out[n] = bp * (log_sum / (n + 1) as f64).exp();
        }
        out
    }
}

/// BLEU-1..4 of a single caption.
pub fn sentence_bleu(hyp: &[String], refs: &[Vec<String>]) -> [f64; MAX_ORDER] {
    let mut stats = BleuStats::default();
    stats.add(hyp, refs);
    stats.scores()
}

/// Reference length closest to the hypothesis length; ties go to the shorter.
fn closest_ref_len(hyp_len: usize, refs: &[Vec<String>]) -> usize {
    refs.iter()
        .map(Vec::len)
        .min_by_key(|&len| (len.abs_diff(hyp_len), len))
        .unwrap_or(0)
}

fn brevity_penalty(hyp_len: usize, ref_len: usize) -> f64 {
    if hyp_len == 0 {
        0.0
    } else if hyp_len >= ref_len {
        1.0
    } else {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    }
}
