//! ROUGE-L: longest common subsequence F-measure against the best reference.

/// Recall weight used by the standard caption benchmarks.
pub const DEFAULT_BETA: f64 = 1.2;

/// ROUGE-L of `hyp` given `refs`.
///
/// Precision and recall are each maximised over the references before they
/// are combined.
pub fn rouge_l(hyp: &[String], refs: &[Vec<String>], beta: f64) -> f64 {
    if hyp.is_empty() {
        return 0.0;
    }
    let mut best_prec: f64 = 0.0;
    let mut best_rec: f64 = 0.0;
    for r in refs.iter().filter(|r| !r.is_empty()) {
        let lcs = lcs_len(hyp, r) as f64;
        best_prec = best_prec.max(lcs / hyp.len() as f64);
        best_rec = best_rec.max(lcs / r.len() as f64);
    }
    if best_prec == 0.0 || best_rec == 0.0 {
        return 0.0;
    }
    let b2 = beta * beta;
    ((1.0 + b2) * best_prec * best_rec) / (best_rec + b2 * best_prec)
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
