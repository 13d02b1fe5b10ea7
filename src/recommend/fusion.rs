//! Score fusion and final selection.
//!
//! The content weight α controls the balance:
//! - α=1.0: content affinity only
//! - α=0.7: 70% content, 30% collaborative (default)
//! - α=0.0: collaborative affinity only

use rand::{seq::IndexedRandom, Rng};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use super::ScoreMap;

/// One ranked persona with the parts of its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub persona_id: String,
    /// Fused score in [0, 1]
    pub score: f32,
    pub content_score: f32,
    pub collab_score: f32,
    /// True when the user has never talked to this persona
    pub novel: bool,
}

/// Which selection policy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Best personas the user has not talked to yet
    Novelty,
    /// User already talked to every persona; best overall fit
    Fallback,
    /// No history; random sample of the registry
    ColdStart,
}

/// Fuse content and collaborative scores over the union of their persona ids.
///
///   score(p) = α * content(p) + (1-α) * collab(p)
///
/// Missing entries count as 0.0. Sorted by score descending, ties by persona id.
pub fn fuse(
    content: &ScoreMap,
    collab: &ScoreMap,
    alpha: f32,
    interacted: &BTreeSet<String>,
) -> Vec<Recommendation> {
    let alpha = alpha.clamp(0.0, 1.0);

    let ids: HashSet<&String> = content.keys().chain(collab.keys()).collect();

    let mut ranked: Vec<Recommendation> = ids
        .into_iter()
        .map(|persona_id| {
            let content_score = content.get(persona_id).copied().unwrap_or(0.0);
            let collab_score = collab.get(persona_id).copied().unwrap_or(0.0);
            Recommendation {
                persona_id: persona_id.clone(),
                score: (alpha * content_score + (1.0 - alpha) * collab_score).clamp(0.0, 1.0),
                content_score,
                collab_score,
                novel: !interacted.contains(persona_id),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.persona_id.cmp(&b.persona_id))
    });

    ranked
}

/// Top `k` novel personas, or the top `k` overall when none are novel.
pub fn select(ranked: Vec<Recommendation>, k: usize) -> (Strategy, Vec<Recommendation>) {
    let novel: Vec<Recommendation> = ranked.iter().filter(|r| r.novel).cloned().collect();

    if novel.is_empty() {
        (Strategy::Fallback, ranked.into_iter().take(k).collect())
    } else {
        (Strategy::Novelty, novel.into_iter().take(k).collect())
    }
}

/// Uniform sample of `k` distinct ids (all of them if `k` exceeds the pool).
pub fn cold_start<R: Rng + ?Sized>(persona_ids: &[String], k: usize, rng: &mut R) -> Vec<String> {
    persona_ids.choose_multiple(rng, k).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn scores(items: &[(&str, f32)]) -> ScoreMap {
        items.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    fn ids(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.persona_id.as_str()).collect()
    }

    #[test]
    fn test_fuse_weighted_sum_over_union() {
        let content = scores(&[("A", 1.0), ("B", 0.0)]);
        let collab = scores(&[("B", 1.0), ("C", 0.5)]);

        let ranked = fuse(&content, &collab, 0.6, &BTreeSet::new());
        assert_eq!(ranked.len(), 3);

        let get = |id: &str| ranked.iter().find(|r| r.persona_id == id).unwrap().score;
        assert!((get("A") - 0.6).abs() < 1e-6);
        assert!((get("B") - 0.4).abs() < 1e-6);
        assert!((get("C") - 0.2).abs() < 1e-6);
        assert_eq!(ids(&ranked), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_fuse_ties_broken_by_id() {
        let content = scores(&[("C", 0.5), ("A", 0.5), ("B", 0.5)]);
        let ranked = fuse(&content, &ScoreMap::new(), 1.0, &BTreeSet::new());
        assert_eq!(ids(&ranked), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_fuse_alpha_extremes() {
        let content = scores(&[("A", 1.0), ("B", 0.0)]);
        let collab = scores(&[("A", 0.0), ("B", 1.0)]);

        assert_eq!(ids(&fuse(&content, &collab, 1.0, &BTreeSet::new()))[0], "A");
        assert_eq!(ids(&fuse(&content, &collab, 0.0, &BTreeSet::new()))[0], "B");
        // clamped
        assert_eq!(ids(&fuse(&content, &collab, 7.0, &BTreeSet::new()))[0], "A");
    }

    #[test]
    fn test_fuse_marks_interacted() {
        let content = scores(&[("A", 1.0), ("B", 0.0)]);
        let interacted = BTreeSet::from(["A".to_string()]);
        let ranked = fuse(&content, &ScoreMap::new(), 0.5, &interacted);
        assert!(!ranked.iter().find(|r| r.persona_id == "A").unwrap().novel);
        assert!(ranked.iter().find(|r| r.persona_id == "B").unwrap().novel);
    }

    #[test]
    fn test_select_prefers_novel() {
        let content = scores(&[("A", 0.9), ("B", 0.5), ("C", 0.1), ("D", 0.3)]);
        let interacted = BTreeSet::from(["A".to_string()]);
        let ranked = fuse(&content, &ScoreMap::new(), 1.0, &interacted);

        let (strategy, picked) = select(ranked, 2);
        assert_eq!(strategy, Strategy::Novelty);
        assert_eq!(ids(&picked), vec!["B", "D"]);
    }

    #[test]
    fn test_select_returns_fewer_novel_than_k() {
        let content = scores(&[("A", 0.9), ("B", 0.5)]);
        let interacted = BTreeSet::from(["A".to_string()]);
        let (strategy, picked) = select(fuse(&content, &ScoreMap::new(), 1.0, &interacted), 3);
        assert_eq!(strategy, Strategy::Novelty);
        assert_eq!(ids(&picked), vec!["B"]);
    }

    #[test]
    fn test_select_falls_back_when_exhausted() {
        let content = scores(&[("A", 0.2), ("B", 0.8)]);
        let interacted = BTreeSet::from(["A".to_string(), "B".to_string()]);
        let (strategy, picked) = select(fuse(&content, &ScoreMap::new(), 1.0, &interacted), 3);
        assert_eq!(strategy, Strategy::Fallback);
        assert_eq!(ids(&picked), vec!["B", "A"]);
    }

    #[test]
    fn test_select_zero_k() {
        let content = scores(&[("A", 0.2)]);
        let (_, picked) = select(fuse(&content, &ScoreMap::new(), 1.0, &BTreeSet::new()), 0);
        assert!(picked.is_empty());
    }

    #[test]
    fn test_cold_start_distinct_sample() {
        let pool: Vec<String> = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let picked = cold_start(&pool, 3, &mut rng);
            assert_eq!(picked.len(), 3);
            let unique: HashSet<&String> = picked.iter().collect();
            assert_eq!(unique.len(), 3);
            assert!(picked.iter().all(|p| pool.contains(p)));
        }
    }

    #[test]
    fn test_cold_start_varies_with_rng() {
        let pool: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

        let samples: HashSet<Vec<String>> = (0..50u64)
            .map(|seed| cold_start(&pool, 2, &mut StdRng::seed_from_u64(seed)))
            .collect();
        assert!(samples.len() > 1, "every seed produced {samples:?}");

        let again = cold_start(&pool, 2, &mut StdRng::seed_from_u64(3));
        assert_eq!(again, cold_start(&pool, 2, &mut StdRng::seed_from_u64(3)));
    }

    #[test]
    fn test_cold_start_k_larger_than_pool() {
        let pool = vec!["A".to_string(), "B".to_string()];
        let mut picked = cold_start(&pool, 5, &mut rand::rng());
        picked.sort();
        assert_eq!(picked, pool);
    }
}
