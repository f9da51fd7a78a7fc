//! Paragraph ranking and threshold selection.

use serde::{Deserialize, Serialize};

use crate::config::ContextConfig;

/// Fallback used when no paragraph clears the primary threshold.
///
/// If the best similarity is at least `floor`, the bound drops to
/// `best * factor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxPolicy {
    pub floor: f32,
    pub factor: f32,
}

impl Default for RelaxPolicy {
    fn default() -> Self {
        Self {
            floor: 0.3,
            factor: 0.8,
        }
    }
}

impl RelaxPolicy {
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            floor: config.relax_floor,
            factor: config.relax_factor,
        }
    }
}

/// Indices of the selected paragraphs, best first.
///
/// Paragraphs are ranked by descending similarity (ties keep document order)
/// and kept when at or above `threshold`, or the relaxed bound when nothing
/// passes. At most `top_n` indices are returned.
pub fn select_paragraphs(
    similarities: &[f32],
    top_n: usize,
    threshold: f32,
    policy: RelaxPolicy,
) -> Vec<usize> {
    let score = |i: usize| {
        let s = similarities[i];
        if s.is_nan() {
            f32::NEG_INFINITY
        } else {
            s
        }
    };

    let mut ranked: Vec<usize> = (0..similarities.len()).collect();
    ranked.sort_by(|&a, &b| score(b).total_cmp(&score(a)));

    let mut bound = threshold;
    if !ranked.iter().any(|&i| score(i) >= threshold) {
        match ranked.first() {
            Some(&best) if score(best) >= policy.floor => {
                bound = score(best) * policy.factor;
                tracing::debug!(
                    "No paragraph reached {threshold:.3}; relaxing bound to {bound:.3}"
                );
            }
            _ => return Vec::new(),
        }
    }

    ranked
        .into_iter()
        .filter(|&i| score(i) >= bound)
        .take(top_n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: RelaxPolicy = RelaxPolicy {
        floor: 0.3,
        factor: 0.8,
    };

    #[test]
    fn test_ranks_descending_above_threshold() {
        let sims = [0.2, 0.9, 0.55, 0.7];
        assert_eq!(select_paragraphs(&sims, 3, 0.5, POLICY), vec![1, 3, 2]);
    }

    #[test]
    fn test_top_n_bounds_selection() {
        let sims = [0.9, 0.8, 0.7, 0.6];
        assert_eq!(select_paragraphs(&sims, 2, 0.5, POLICY), vec![0, 1]);
    }

    #[test]
    fn test_relaxed_bound_when_nothing_passes() {
        // best = 0.45 -> bound 0.36
        let sims = [0.1, 0.45, 0.37, 0.35];
        assert_eq!(select_paragraphs(&sims, 3, 0.5, POLICY), vec![1, 2]);
    }

    #[test]
    fn test_low_best_similarity_selects_nothing() {
        let sims = [0.1, 0.29, 0.2];
        assert!(select_paragraphs(&sims, 3, 0.5, POLICY).is_empty());
    }

    #[test]
    fn test_ties_keep_document_order() {
        let sims = [0.6, 0.8, 0.6, 0.8];
        assert_eq!(select_paragraphs(&sims, 4, 0.5, POLICY), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_nan_never_selected() {
        let sims = [f32::NAN, 0.7];
        assert_eq!(select_paragraphs(&sims, 3, 0.5, POLICY), vec![1]);
    }

    #[test]
    fn test_empty_input() {
        assert!(select_paragraphs(&[], 3, 0.5, POLICY).is_empty());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RelaxPolicy::from_config(&ContextConfig::default());
        assert_eq!(policy, RelaxPolicy::default());
    }
}
