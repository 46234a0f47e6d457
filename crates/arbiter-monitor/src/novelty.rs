//! Novelty-based convergence monitoring (§4.7).
//!
//! A pure reducer: `fn reduce(state, event) -> (next_state, commands)`.
//! Given the prior streak state and this batch's measured novelty, it
//! returns the next streak state and the `ConvergenceTraceRecord` to
//! persist. No IO, no clock reads, so the same batch sequence always
//! produces the same trace.

use arbiter_types::config::{StopMode, StopPolicy};
use arbiter_types::convergence::{ConvergenceTraceRecord, StopStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoveltyState {
    pub low_novelty_streak: u32,
}

/// Measured inputs for one batch. `novelty_rate` and `mean_max_sim_to_prior`
/// are `None` when clustering is disabled or the batch had zero eligible
/// trials to measure.
#[derive(Debug, Clone)]
pub struct BatchNoveltyInput {
    pub batch_number: u32,
    pub k_attempted: u32,
    pub k_eligible: u32,
    pub novelty_rate: Option<f64>,
    pub mean_max_sim_to_prior: Option<f64>,
    pub cluster_count: Option<u32>,
    pub cluster_distribution: Option<Vec<u32>>,
    pub prior_distribution: Option<Vec<u32>>,
}

/// Jensen-Shannon divergence (base-2) between two non-negative count
/// vectors, treated as distributions. Shorter vector is zero-padded so
/// clusters discovered after the comparison point don't break the shape.
pub fn jensen_shannon_divergence(prev_counts: &[u32], cur_counts: &[u32]) -> f64 {
    let len = prev_counts.len().max(cur_counts.len());
    let pad = |counts: &[u32]| -> Vec<f64> {
        let total: f64 = counts.iter().map(|c| *c as f64).sum();
        (0..len)
            .map(|i| {
                let c = counts.get(i).copied().unwrap_or(0) as f64;
                if total > 0.0 {
                    c / total
                } else {
                    0.0
                }
            })
            .collect()
    };
    let p = pad(prev_counts);
    let q = pad(cur_counts);

    let kl = |a: &[f64], b: &[f64]| -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| if *ai > 0.0 && *bi > 0.0 { ai * (ai / bi).log2() } else { 0.0 })
            .sum()
    };

    let m: Vec<f64> = p.iter().zip(q.iter()).map(|(a, b)| 0.5 * (a + b)).collect();
    0.5 * kl(&p, &m) + 0.5 * kl(&q, &m)
}

/// Advances the stop state machine by one batch.
pub fn reduce(
    state: NoveltyState,
    input: BatchNoveltyInput,
    policy: &StopPolicy,
    mode: StopMode,
) -> (NoveltyState, ConvergenceTraceRecord) {
    let js_divergence = match (&input.prior_distribution, &input.cluster_distribution) {
        (Some(prev), Some(cur)) => Some(jensen_shannon_divergence(prev, cur)),
        _ => None,
    };

    let satisfies_novelty_floor = input
        .novelty_rate
        .map(|rate| rate <= policy.novelty_epsilon)
        .unwrap_or(false);
    let satisfies_similarity_floor = input
        .mean_max_sim_to_prior
        .map(|sim| sim >= policy.similarity_threshold)
        .unwrap_or(false);
    let would_stop = satisfies_novelty_floor && satisfies_similarity_floor;

    let low_novelty_streak = if would_stop { state.low_novelty_streak + 1 } else { 0 };
    let should_stop = mode == StopMode::Enforcer && low_novelty_streak >= policy.patience;

    let record = ConvergenceTraceRecord {
        batch_number: input.batch_number,
        k_attempted: input.k_attempted,
        k_eligible: input.k_eligible,
        novelty_rate: input.novelty_rate,
        mean_max_sim_to_prior: input.mean_max_sim_to_prior,
        cluster_count: input.cluster_count,
        cluster_distribution: input.cluster_distribution,
        js_divergence,
        low_novelty_streak,
        stop: StopStatus {
            mode,
            would_stop,
            should_stop,
        },
    };

    (NoveltyState { low_novelty_streak }, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> StopPolicy {
        StopPolicy {
            novelty_epsilon: 0.05,
            similarity_threshold: 0.9,
            patience: 2,
        }
    }

    fn input(batch: u32, novelty: f64, sim: f64) -> BatchNoveltyInput {
        BatchNoveltyInput {
            batch_number: batch,
            k_attempted: 10,
            k_eligible: 10,
            novelty_rate: Some(novelty),
            mean_max_sim_to_prior: Some(sim),
            cluster_count: Some(3),
            cluster_distribution: Some(vec![5, 3, 2]),
            prior_distribution: Some(vec![5, 3, 1]),
        }
    }

    #[test]
    fn divergence_of_identical_distributions_is_zero() {
        let d = jensen_shannon_divergence(&[5, 3, 2], &[5, 3, 2]);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn divergence_of_disjoint_distributions_is_one_bit() {
        let d = jensen_shannon_divergence(&[10, 0], &[0, 10]);
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn streak_resets_when_novelty_is_high() {
        let state = NoveltyState { low_novelty_streak: 3 };
        let (next, record) = reduce(state, input(4, 0.5, 0.5), &policy(), StopMode::Advisor);
        assert_eq!(next.low_novelty_streak, 0);
        assert!(!record.stop.would_stop);
    }

    #[test]
    fn streak_grows_and_triggers_stop_after_patience_batches() {
        let policy = policy();
        let (state1, record1) = reduce(NoveltyState::default(), input(0, 0.01, 0.95), &policy, StopMode::Enforcer);
        assert!(record1.stop.would_stop);
        assert!(!record1.stop.should_stop);

        let (state2, record2) = reduce(state1, input(1, 0.01, 0.95), &policy, StopMode::Enforcer);
        assert_eq!(state2.low_novelty_streak, 2);
        assert!(record2.stop.should_stop);
    }

    #[test]
    fn advisor_mode_never_signals_should_stop_even_past_patience() {
        let policy = policy();
        let (state1, record1) = reduce(NoveltyState::default(), input(0, 0.01, 0.95), &policy, StopMode::Advisor);
        assert!(record1.stop.would_stop);
        assert!(!record1.stop.should_stop);

        let (_, record2) = reduce(state1, input(1, 0.01, 0.95), &policy, StopMode::Advisor);
        assert!(record2.stop.would_stop);
        assert!(!record2.stop.should_stop);
    }

    #[test]
    fn disabled_mode_never_signals_should_stop() {
        let policy = policy();
        let (state1, _) = reduce(NoveltyState::default(), input(0, 0.0, 1.0), &policy, StopMode::Disabled);
        let (_, record2) = reduce(state1, input(1, 0.0, 1.0), &policy, StopMode::Disabled);
        assert!(!record2.stop.should_stop);
    }

    #[test]
    fn missing_metrics_never_counts_as_would_stop() {
        let policy = policy();
        let mut input = input(0, 0.0, 1.0);
        input.novelty_rate = None;
        let (_, record) = reduce(NoveltyState::default(), input, &policy, StopMode::Advisor);
        assert!(!record.stop.would_stop);
    }
}
