//! Source example selection.
//!
//! K_i: Selection is a pure function of (corpus, label, count, seed).
//! B_i: The pool may be too small → InsufficientData, never silent truncation

use crate::models::{ContrastError, Label, Result, SourceExample};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Select `count` examples carrying `label`.
///
/// With a seed the filtered pool is shuffled deterministically before
/// truncation; without one, corpus order is kept.
pub fn select(
    corpus: &[SourceExample],
    label: Label,
    count: usize,
    seed: Option<u64>,
) -> Result<Vec<SourceExample>> {
    let mut pool: Vec<&SourceExample> = corpus.iter().filter(|e| e.label == label).collect();

    if pool.len() < count {
        return Err(ContrastError::InsufficientData {
            label,
            requested: count,
            available: pool.len(),
        });
    }

    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        pool.shuffle(&mut rng);
    }

    Ok(pool.into_iter().take(count).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<SourceExample> {
        (0..60)
            .map(|i| {
                let label = Label::from_code(i % 3).unwrap();
                SourceExample::new(format!("premise {i}"), format!("hypothesis {i}"), label)
            })
            .collect()
    }

    #[test]
    fn test_unseeded_keeps_corpus_order() {
        let corpus = corpus();
        let picked = select(&corpus, Label::Neutral, 3, None).unwrap();
        let premises: Vec<_> = picked.iter().map(|e| e.premise.as_str()).collect();
        assert_eq!(premises, ["premise 1", "premise 4", "premise 7"]);
    }

    #[test]
    fn test_only_requested_label() {
        let corpus = corpus();
        let picked = select(&corpus, Label::Contradiction, 20, Some(7)).unwrap();
        assert_eq!(picked.len(), 20);
        assert!(picked.iter().all(|e| e.label == Label::Contradiction));
    }

    #[test]
    fn test_seeded_selection_is_deterministic() {
        let corpus = corpus();
        let a = select(&corpus, Label::Entailment, 10, Some(42)).unwrap();
        let b = select(&corpus, Label::Entailment, 10, Some(42)).unwrap();
        assert_eq!(a, b);

        let unseeded = select(&corpus, Label::Entailment, 10, None).unwrap();
        let other_seed = select(&corpus, Label::Entailment, 10, Some(43)).unwrap();
        // 20 entailment examples; a shuffle matching corpus order for every
        // seed tried would mean the seed is ignored.
        assert!(a != unseeded || other_seed != unseeded);
    }

    #[test]
    fn test_insufficient_pool_is_an_error() {
        let corpus = corpus();
        let err = select(&corpus, Label::Neutral, 21, None).unwrap_err();
        match err {
            ContrastError::InsufficientData {
                label,
                requested,
                available,
            } => {
                assert_eq!(label, Label::Neutral);
                assert_eq!(requested, 21);
                assert_eq!(available, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        assert!(select(&[], Label::Neutral, 0, Some(1)).unwrap().is_empty());
    }
}
