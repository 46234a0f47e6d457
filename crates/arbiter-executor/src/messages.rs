//! Per-protocol message construction (§4.4).
//!
//! `independent` trials are a single system+user exchange. `debate_v1`
//! trials run three turns between the `proposer` and `critic` personas
//! assigned by the planner: an opening proposal, a critique, and a final
//! revision that sees the critique.

use arbiter_types::config::{DecisionContract, ResolvedConfig};
use arbiter_types::plan::TrialPlanEntry;
use arbiter_types::trial::{CallMessage, MessageRole};

use crate::contract::CompiledContract;

fn contract_instructions(contract: Option<&DecisionContract>) -> String {
    match contract {
        Some(c) => format!(
            "Respond with a single JSON object conforming to this schema, and nothing else \
             (no prose, no markdown fences):\n{}",
            serde_json::to_string_pretty(&c.schema).unwrap_or_default()
        ),
        None => "Respond in plain text.".to_string(),
    }
}

fn persona_system_prompt(persona_id: &str, role_note: &str, contract: Option<&DecisionContract>) -> String {
    format!(
        "You are answering as the '{persona_id}' persona. {role_note}\n\n{}",
        contract_instructions(contract)
    )
}

/// Builds the single system+user turn for an `independent` trial.
pub fn build_independent_messages(
    entry: &TrialPlanEntry,
    resolved: &ResolvedConfig,
    compiled: Option<&CompiledContract>,
) -> Vec<CallMessage> {
    let contract = compiled.map(|c| c.contract());
    let system = persona_system_prompt(
        &entry.assigned_config.persona_id,
        "Answer the question directly and completely.",
        contract,
    );
    vec![
        CallMessage {
            role: MessageRole::System,
            content: system,
        },
        CallMessage {
            role: MessageRole::User,
            content: resolved.question_text.clone(),
        },
    ]
}

/// One turn already exchanged, kept so later turns can reference it.
pub struct PriorTurn {
    pub role_label: String,
    pub response_text: String,
}

/// Builds the messages for turn `turn_index` (0-based) of a `debate_v1`
/// trial, given the turns already completed.
pub fn build_debate_turn(
    turn_index: u32,
    entry: &TrialPlanEntry,
    resolved: &ResolvedConfig,
    compiled: Option<&CompiledContract>,
    prior: &[PriorTurn],
) -> (String, Vec<CallMessage>) {
    let contract = compiled.map(|c| c.contract());
    let roles = entry
        .role_assignments
        .as_ref()
        .expect("debate_v1 trials always carry role assignments");

    match turn_index {
        0 => {
            let system = persona_system_prompt(
                &roles.proposer,
                "Propose an initial answer to the question.",
                contract,
            );
            (
                "proposer".to_string(),
                vec![
                    CallMessage {
                        role: MessageRole::System,
                        content: system,
                    },
                    CallMessage {
                        role: MessageRole::User,
                        content: resolved.question_text.clone(),
                    },
                ],
            )
        }
        1 => {
            let system = persona_system_prompt(
                &roles.critic,
                "Critique the proposed answer below. Identify flaws or gaps.",
                None,
            );
            let proposal = prior
                .first()
                .map(|p| p.response_text.clone())
                .unwrap_or_default();
            (
                "critic".to_string(),
                vec![
                    CallMessage {
                        role: MessageRole::System,
                        content: system,
                    },
                    CallMessage {
                        role: MessageRole::User,
                        content: format!(
                            "Question: {}\n\nProposed answer: {}",
                            resolved.question_text, proposal
                        ),
                    },
                ],
            )
        }
        _ => {
            let system = persona_system_prompt(
                &roles.proposer,
                "Revise your answer in light of the critique below, producing a final answer.",
                contract,
            );
            let proposal = prior
                .first()
                .map(|p| p.response_text.clone())
                .unwrap_or_default();
            let critique = prior
                .get(1)
                .map(|p| p.response_text.clone())
                .unwrap_or_default();
            (
                "proposer_final".to_string(),
                vec![
                    CallMessage {
                        role: MessageRole::System,
                        content: system,
                    },
                    CallMessage {
                        role: MessageRole::User,
                        content: format!(
                            "Question: {}\n\nYour initial answer: {}\n\nCritique: {}",
                            resolved.question_text, proposal, critique
                        ),
                    },
                ],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::config::ProtocolKind;
    use arbiter_types::plan::{AssignedConfig, DecodeParams, RoleAssignments};

    fn resolved() -> ResolvedConfig {
        super::test_support::sample_resolved_config()
    }

    fn debate_entry() -> TrialPlanEntry {
        TrialPlanEntry {
            trial_id: 0,
            protocol: ProtocolKind::DebateV1,
            assigned_config: AssignedConfig {
                model: "model-a".to_string(),
                persona_id: "neutral".to_string(),
                protocol_id: "debate".to_string(),
                decode: DecodeParams {
                    temperature: None,
                    top_p: None,
                    max_tokens: None,
                    seed: 1,
                },
            },
            role_assignments: Some(RoleAssignments {
                proposer: "optimist".to_string(),
                critic: "skeptic".to_string(),
            }),
        }
    }

    #[test]
    fn debate_turns_reference_prior_responses() {
        let entry = debate_entry();
        let resolved = resolved();
        let (label0, _) = build_debate_turn(0, &entry, &resolved, None, &[]);
        assert_eq!(label0, "proposer");

        let prior = vec![PriorTurn {
            role_label: "proposer".to_string(),
            response_text: "42".to_string(),
        }];
        let (label1, messages1) = build_debate_turn(1, &entry, &resolved, None, &prior);
        assert_eq!(label1, "critic");
        assert!(messages1[1].content.contains("42"));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use arbiter_types::config::*;

    pub fn sample_resolved_config() -> ResolvedConfig {
        ResolvedConfig {
            question_id: "q1".to_string(),
            question_text: "What is the answer?".to_string(),
            sampling: Sampling::default(),
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
                k_max: 1,
                batch_size: 1,
                workers: 1,
                k_min: 0,
                k_min_count_rule: KMinCountRule::KEligible,
                stop_mode: StopMode::Disabled,
                stop_policy: StopPolicy {
                    novelty_epsilon: 0.0,
                    similarity_threshold: 1.0,
                    patience: 1,
                },
                retry_policy: RetryPolicy::default(),
                contract_failure_policy: ContractFailurePolicy::default(),
            },
            measurement: Measurement {
                embedding_model: "test-embed".to_string(),
                embed_text_strategy: EmbedTextStrategy::OutcomeOnly,
                embedding_max_chars: 1000,
                clustering: ClusteringConfig {
                    enabled: false,
                    tau: 0.9,
                    centroid_update_rule: CentroidUpdateRule::FixedLeader,
                    cluster_limit: 10,
                    stop_mode: StopMode::Disabled,
                },
            },
            run: RunMeta {
                run_id: "run-test".to_string(),
                seed: 1,
            },
        }
    }
}
