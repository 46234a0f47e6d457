//! Deterministic trial planning (§4.2).
//!
//! The plan is a pure function of `(resolved_config, run_seed)`: replaying
//! the same config and seed always produces the same `TrialPlan`, entry for
//! entry, byte for byte. All randomness is drawn from `arbiter_rng` streams
//! keyed by `(run_seed, label, trial_id)`, never from a single shared stream,
//! so trials can be planned out of order (or in parallel) without changing
//! the result.

use arbiter_rng::{SeededRng, StreamLabel};
use arbiter_types::config::{ProtocolKind, ResolvedConfig, WeightedEntry};
use arbiter_types::plan::{AssignedConfig, DecodeParams, RoleAssignments, TrialPlan, TrialPlanEntry};

/// Picks the index of one entry from a weighted list. Ties in the
/// cumulative-weight walk resolve to the lower index: the first entry whose
/// cumulative weight exceeds the draw wins, never a later one with an equal
/// boundary.
fn weighted_pick_index(entries: &[WeightedEntry], rng: &mut SeededRng) -> usize {
    assert!(!entries.is_empty(), "weighted list must not be empty");
    let total: f64 = entries.iter().map(|e| e.weight.max(0.0)).sum();
    if total <= 0.0 {
        // Degenerate weights: fall back to uniform choice over indices so
        // the planner never panics on a misconfigured (but validated
        // upstream) weight table.
        return rng.index_below(entries.len());
    }
    let draw = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (idx, entry) in entries.iter().enumerate() {
        cumulative += entry.weight.max(0.0);
        if draw < cumulative {
            return idx;
        }
    }
    entries.len() - 1
}

/// Picks one entry from a weighted list (see [`weighted_pick_index`]).
fn weighted_pick<'a>(entries: &'a [WeightedEntry], rng: &mut SeededRng) -> &'a WeightedEntry {
    &entries[weighted_pick_index(entries, rng)]
}

/// Draws `count` distinct persona ids from the weighted list without
/// replacement, by weighted-picking from the shrinking remainder: each draw
/// removes the chosen entry from the pool before the next draw. Falls back
/// to drawing fewer than `count` only when the pool itself is smaller.
fn draw_distinct_personas(entries: &[WeightedEntry], count: usize, rng: &mut SeededRng) -> Vec<String> {
    let mut remaining: Vec<WeightedEntry> = entries.to_vec();
    let draw_count = count.min(remaining.len());
    let mut drawn = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = weighted_pick_index(&remaining, rng);
        drawn.push(remaining.remove(idx).id);
    }
    drawn
}

fn sample_decode(config: &ResolvedConfig, rng: &mut SeededRng, seed: u64) -> DecodeParams {
    let ranges = &config.sampling.decode;
    let temperature = ranges
        .temperature
        .as_ref()
        .map(|r| rng.uniform_range(r.min, r.max));
    let top_p = ranges.top_p.as_ref().map(|r| rng.uniform_range(r.min, r.max));
    let max_tokens = ranges
        .max_tokens
        .as_ref()
        .map(|r| rng.uniform_int_range(r.min as i64, r.max as i64) as u32);
    DecodeParams {
        temperature,
        top_p,
        max_tokens,
        seed,
    }
}

/// Builds the full trial plan for a resolved config and run seed.
///
/// Trial ids are assigned `0..k_max` in order; each trial draws from its own
/// `plan` and `decode` streams keyed by its own `trial_id`, so any subset of
/// trials can be replanned in isolation and still match the full plan.
pub fn build_plan(config: &ResolvedConfig) -> TrialPlan {
    let run_seed = config.run.seed;
    let k_max = config.execution.k_max;
    let mut entries = Vec::with_capacity(k_max as usize);

    for trial_id in 0..k_max {
        let mut plan_rng = SeededRng::for_stream(run_seed, StreamLabel::Plan, trial_id);
        let model = weighted_pick(&config.sampling.models, &mut plan_rng).id.clone();
        let persona_id = weighted_pick(&config.sampling.personas, &mut plan_rng)
            .id
            .clone();
        let protocol_id = weighted_pick(&config.sampling.protocols, &mut plan_rng)
            .id
            .clone();

        let mut decode_rng = SeededRng::for_stream(run_seed, StreamLabel::Decode, trial_id);
        let decode_seed = decode_rng.next_u64();
        let decode = sample_decode(config, &mut decode_rng, decode_seed);

        let role_assignments = if config.protocol.kind == ProtocolKind::DebateV1 {
            let participants = config.protocol.participants.unwrap_or(2).max(2) as usize;
            let drawn = draw_distinct_personas(&config.sampling.personas, participants, &mut plan_rng);
            let proposer = drawn[0].clone();
            let critic = drawn.get(1).cloned().unwrap_or_else(|| proposer.clone());
            Some(RoleAssignments { proposer, critic })
        } else {
            None
        };

        entries.push(TrialPlanEntry {
            trial_id,
            protocol: config.protocol.kind,
            assigned_config: AssignedConfig {
                model,
                persona_id,
                protocol_id,
                decode,
            },
            role_assignments,
        });
    }

    let plan_sha256 = arbiter_types::hashing::sha256_of(&entries);
    TrialPlan {
        entries,
        plan_sha256,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::config::{
        CentroidUpdateRule, ClusteringConfig, ContractFailurePolicy, EmbedTextStrategy, Execution,
        KMinCountRule, Measurement, PerCallTimeouts, ProtocolConfig, Range, RetryPolicy, RunMeta,
        Sampling, StopMode, StopPolicy,
    };

    fn entries(ids: &[&str]) -> Vec<WeightedEntry> {
        ids.iter()
            .map(|id| WeightedEntry {
                id: id.to_string(),
                weight: 1.0,
            })
            .collect()
    }

    fn sample_config() -> ResolvedConfig {
        ResolvedConfig {
            question_id: "q1".to_string(),
            question_text: "What is the answer?".to_string(),
            sampling: Sampling {
                models: entries(&["model-a", "model-b"]),
                personas: entries(&["neutral", "skeptic", "optimist"]),
                protocols: entries(&["default"]),
                instruments: Vec::new(),
                decode: arbiter_types::config::DecodeRanges {
                    temperature: Some(Range { min: 0.0, max: 1.0 }),
                    top_p: None,
                    max_tokens: Some(Range {
                        min: 128.0,
                        max: 512.0,
                    }),
                },
            },
            protocol: ProtocolConfig {
                kind: ProtocolKind::Independent,
                participants: None,
                rounds: None,
                decision_contract: None,
                timeouts: PerCallTimeouts {
                    per_call_timeout_ms: 30_000,
                },
            },
            execution: Execution {
                k_max: 8,
                batch_size: 4,
                workers: 2,
                k_min: 4,
                k_min_count_rule: KMinCountRule::KEligible,
                stop_mode: StopMode::Advisor,
                stop_policy: StopPolicy {
                    novelty_epsilon: 0.02,
                    similarity_threshold: 0.85,
                    patience: 2,
                },
                retry_policy: RetryPolicy::default(),
                contract_failure_policy: ContractFailurePolicy::default(),
            },
            measurement: Measurement {
                embedding_model: "text-embedding-test".to_string(),
                embed_text_strategy: EmbedTextStrategy::OutcomeOnly,
                embedding_max_chars: 4000,
                clustering: ClusteringConfig {
                    enabled: true,
                    tau: 0.85,
                    centroid_update_rule: CentroidUpdateRule::FixedLeader,
                    cluster_limit: 16,
                    stop_mode: StopMode::Advisor,
                },
            },
            run: RunMeta {
                run_id: "run-test".to_string(),
                seed: 1234,
            },
        }
    }

    #[test]
    fn plan_is_deterministic_for_fixed_seed() {
        let config = sample_config();
        let a = build_plan(&config);
        let b = build_plan(&config);
        assert_eq!(a.plan_sha256, b.plan_sha256);
        assert_eq!(a.entries.len(), b.entries.len());
        for (x, y) in a.entries.iter().zip(b.entries.iter()) {
            assert_eq!(x.assigned_config.model, y.assigned_config.model);
            assert_eq!(x.assigned_config.persona_id, y.assigned_config.persona_id);
            assert_eq!(x.assigned_config.decode.temperature, y.assigned_config.decode.temperature);
        }
    }

    #[test]
    fn plan_has_k_max_entries_with_sequential_trial_ids() {
        let config = sample_config();
        let plan = build_plan(&config);
        assert_eq!(plan.k_planned(), 8);
        for (idx, entry) in plan.entries.iter().enumerate() {
            assert_eq!(entry.trial_id, idx as u32);
        }
    }

    #[test]
    fn different_seed_changes_the_plan_hash() {
        let mut config = sample_config();
        let a = build_plan(&config);
        config.run.seed = 9999;
        let b = build_plan(&config);
        assert_ne!(a.plan_sha256, b.plan_sha256);
    }

    #[test]
    fn debate_protocol_populates_role_assignments() {
        let mut config = sample_config();
        config.protocol.kind = ProtocolKind::DebateV1;
        config.protocol.participants = Some(2);
        let plan = build_plan(&config);
        for entry in &plan.entries {
            assert!(entry.role_assignments.is_some());
        }
    }

    #[test]
    fn debate_protocol_draws_distinct_proposer_and_critic() {
        let mut config = sample_config();
        config.protocol.kind = ProtocolKind::DebateV1;
        config.protocol.participants = Some(3);
        let plan = build_plan(&config);
        for entry in &plan.entries {
            let roles = entry.role_assignments.as_ref().unwrap();
            assert_ne!(roles.proposer, roles.critic);
        }
    }

    #[test]
    fn debate_protocol_defaults_participants_to_two_when_unset() {
        let mut config = sample_config();
        config.protocol.kind = ProtocolKind::DebateV1;
        config.protocol.participants = None;
        let plan = build_plan(&config);
        for entry in &plan.entries {
            assert!(entry.role_assignments.is_some());
        }
    }

    #[test]
    fn independent_protocol_omits_role_assignments() {
        let config = sample_config();
        let plan = build_plan(&config);
        for entry in &plan.entries {
            assert!(entry.role_assignments.is_none());
        }
    }
}
