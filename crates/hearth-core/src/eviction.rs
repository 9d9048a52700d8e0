//! Eviction policy engine: victim selection under memory pressure.
//!
//! Pure scoring over a candidate snapshot; the scheduler owns the actual
//! unload transitions. Pinned models are never selected. The weighting of
//! priority vs. recency vs. predicted demand is configuration, not code.

use crate::registry::PriorityClass;
use serde::Deserialize;
use tracing::debug;

/// Idle-time normalization knee: ten minutes of idleness scores 0.5.
const IDLE_KNEE_MS: f64 = 10.0 * 60.0 * 1000.0;

/// Configurable weights for the eviction score.
#[derive(Debug, Clone, Deserialize)]
pub struct EvictionWeights {
    /// Weight of the priority-class factor.
    pub priority_weight: f64,
    /// Weight of the recency (idle time) factor.
    pub recency_weight: f64,
    /// Weight of the inverse predicted-demand factor.
    pub demand_weight: f64,
}

impl Default for EvictionWeights {
    fn default() -> Self {
        Self { priority_weight: 0.5, recency_weight: 0.3, demand_weight: 0.2 }
    }
}

/// One resident slot under consideration for eviction.
#[derive(Debug, Clone)]
pub struct EvictionCandidate {
    /// The resident model.
    pub model_id: String,
    /// Bytes freed if this candidate is evicted.
    pub size_bytes: u64,
    /// The model's priority class.
    pub priority: PriorityClass,
    /// Milliseconds since the model last served a request.
    pub idle_ms: i64,
    /// Usage-tracker demand prediction in `[0, 1]`.
    pub predicted_demand: f64,
}

/// Selects victims to free bytes in a pool under pressure.
pub struct EvictionPolicy {
    weights: EvictionWeights,
}

impl EvictionPolicy {
    /// Creates a policy with the given weights.
    #[must_use]
    pub fn new(weights: EvictionWeights) -> Self {
        Self { weights }
    }

    /// Evictability score for one candidate; larger means evicted sooner.
    fn score(&self, candidate: &EvictionCandidate) -> f64 {
        let priority_factor = match candidate.priority {
            PriorityClass::BestEffort => 1.0,
            PriorityClass::Preferred => 0.4,
            // Callers filter pinned slots out; score them unevictable anyway.
            PriorityClass::Pinned => return f64::NEG_INFINITY,
        };

        let idle = candidate.idle_ms.max(0) as f64;
        let idle_norm = idle / (idle + IDLE_KNEE_MS);

        self.weights.priority_weight * priority_factor
            + self.weights.recency_weight * idle_norm
            + self.weights.demand_weight * (1.0 - candidate.predicted_demand.clamp(0.0, 1.0))
    }

    /// Greedily selects victims, largest score first, until `bytes_needed`
    /// is covered.
    ///
    /// Never selects a pinned candidate and never selects more victims than
    /// required. Ties break toward the oldest `last_used` (largest idle).
    /// Returns `None` when no combination of non-pinned candidates frees
    /// enough space.
    #[must_use]
    pub fn select_victims(
        &self,
        candidates: &[EvictionCandidate],
        bytes_needed: u64,
    ) -> Option<Vec<String>> {
        if bytes_needed == 0 {
            return Some(Vec::new());
        }

        let mut scored: Vec<(&EvictionCandidate, f64)> = candidates
            .iter()
            .filter(|c| c.priority != PriorityClass::Pinned)
            .map(|c| (c, self.score(c)))
            .collect();

        if scored.iter().map(|(c, _)| c.size_bytes).sum::<u64>() < bytes_needed {
            debug!(
                bytes_needed = bytes_needed,
                candidates = scored.len(),
                "Eviction cannot cover the requested bytes"
            );
            return None;
        }

        scored.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.idle_ms.cmp(&a.idle_ms))
        });

        let mut victims = Vec::new();
        let mut freed = 0u64;
        for (candidate, score) in scored {
            if freed >= bytes_needed {
                break;
            }
            debug!(
                model_id = %candidate.model_id,
                score = score,
                size_bytes = candidate.size_bytes,
                "Eviction victim selected"
            );
            victims.push(candidate.model_id.clone());
            freed += candidate.size_bytes;
        }

        Some(victims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        model_id: &str,
        size_bytes: u64,
        priority: PriorityClass,
        idle_ms: i64,
        demand: f64,
    ) -> EvictionCandidate {
        EvictionCandidate {
            model_id: model_id.to_string(),
            size_bytes,
            priority,
            idle_ms,
            predicted_demand: demand,
        }
    }

    fn policy() -> EvictionPolicy {
        EvictionPolicy::new(EvictionWeights::default())
    }

    #[test]
    fn test_pinned_never_selected() {
        let candidates = vec![
            candidate("pinned", 5000, PriorityClass::Pinned, 1_000_000, 0.0),
            candidate("loose", 5000, PriorityClass::BestEffort, 10, 0.9),
        ];

        let victims = policy().select_victims(&candidates, 4000).unwrap();
        assert_eq!(victims, vec!["loose".to_string()]);
    }

    #[test]
    fn test_only_pinned_fails_deterministically() {
        let candidates = vec![candidate("pinned", 5000, PriorityClass::Pinned, 1_000_000, 0.0)];
        assert!(policy().select_victims(&candidates, 1).is_none());
    }

    #[test]
    fn test_idle_best_effort_beats_busy_preferred() {
        let candidates = vec![
            candidate("busy-preferred", 1000, PriorityClass::Preferred, 50, 0.9),
            candidate("idle-best-effort", 1000, PriorityClass::BestEffort, 7_200_000, 0.0),
        ];

        let victims = policy().select_victims(&candidates, 1000).unwrap();
        assert_eq!(victims, vec!["idle-best-effort".to_string()]);
    }

    #[test]
    fn test_never_evicts_more_than_required() {
        let candidates = vec![
            candidate("a", 3000, PriorityClass::BestEffort, 1000, 0.0),
            candidate("b", 3000, PriorityClass::BestEffort, 2000, 0.0),
            candidate("c", 3000, PriorityClass::BestEffort, 3000, 0.0),
        ];

        let victims = policy().select_victims(&candidates, 3000).unwrap();
        assert_eq!(victims.len(), 1);
    }

    #[test]
    fn test_accumulates_until_satisfied() {
        let candidates = vec![
            candidate("a", 2000, PriorityClass::BestEffort, 1000, 0.0),
            candidate("b", 2000, PriorityClass::BestEffort, 2000, 0.0),
        ];

        let victims = policy().select_victims(&candidates, 3500).unwrap();
        assert_eq!(victims.len(), 2);
    }

    #[test]
    fn test_insufficient_candidates_returns_none() {
        let candidates = vec![candidate("a", 1000, PriorityClass::BestEffort, 1000, 0.0)];
        assert!(policy().select_victims(&candidates, 2000).is_none());
    }

    #[test]
    fn test_tie_breaks_toward_oldest() {
        // Identical class and demand; only idle differs.
        let candidates = vec![
            candidate("young", 1000, PriorityClass::BestEffort, 1000, 0.5),
            candidate("old", 1000, PriorityClass::BestEffort, 500_000, 0.5),
        ];

        let victims = policy().select_victims(&candidates, 1000).unwrap();
        assert_eq!(victims, vec!["old".to_string()]);
    }

    #[test]
    fn test_zero_bytes_needed_selects_nothing() {
        let candidates = vec![candidate("a", 1000, PriorityClass::BestEffort, 1000, 0.0)];
        let victims = policy().select_victims(&candidates, 0).unwrap();
        assert!(victims.is_empty());
    }
}
