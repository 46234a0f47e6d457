//! Offline trial executor: a strict substitute for the live executor,
//! implementing the same `TrialExecutor` contract with synthetic content so
//! a full run (planning → execution → clustering → convergence → artifacts)
//! can be exercised without network access or API keys.
//!
//! `ARBITER_MOCK_DELAY_MS` simulates per-call latency; `ARBITER_MOCK_EMPTY_EMBED`
//! forces an empty embed text, exercising the embedding skip-reason path.

use arbiter_rng::{SeededRng, StreamLabel};
use arbiter_types::trial::{Attempt, CallMessage, CallRecord, MessageRole, TrialRecord, TrialStatus, Usage};
use chrono::Utc;

use crate::contract::parse_trial_output;
use crate::embed::{prepare_embed_text, PreparedEmbedText};
use crate::executor::{ExecutedTrial, ExecutionContext, TrialExecutor};
use crate::messages::build_independent_messages;

const MOCK_ANSWERS: [(&str, &str); 3] = [
    ("yes", "the evidence points this way"),
    ("no", "the evidence points the other way"),
    ("maybe", "the evidence is inconclusive"),
];

pub struct MockExecutor;

impl MockExecutor {
    pub fn new() -> Self {
        Self
    }

    fn mock_delay_ms() -> u64 {
        std::env::var("ARBITER_MOCK_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    fn force_empty_embed() -> bool {
        std::env::var("ARBITER_MOCK_EMPTY_EMBED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn synthesize_raw_text(trial_id: u32, has_contract: bool) -> String {
        let (decision, rationale) = MOCK_ANSWERS[(trial_id % 3) as usize];
        if has_contract {
            format!(r#"{{"decision": "{decision}", "rationale": "{rationale}", "confidence": 0.75}}"#)
        } else {
            format!("The answer is {decision}, because {rationale}.")
        }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialExecutor for MockExecutor {
    async fn execute(&self, entry: arbiter_types::plan::TrialPlanEntry, ctx: &ExecutionContext<'_>) -> ExecutedTrial {
        let delay = Self::mock_delay_ms();
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        let started_at = Utc::now();
        let raw_text = Self::synthesize_raw_text(entry.trial_id, ctx.compiled_contract.is_some());

        let request_messages = build_independent_messages(&entry, ctx.resolved, ctx.compiled_contract);
        let call = CallRecord {
            turn: 0,
            role_label: "solo".to_string(),
            messages: request_messages
                .into_iter()
                .chain(std::iter::once(CallMessage {
                    role: MessageRole::Assistant,
                    content: raw_text.clone(),
                }))
                .collect(),
            response_text: raw_text.clone(),
        };

        let mut parsed = parse_trial_output(entry.trial_id, &raw_text, ctx.compiled_contract);
        if Self::force_empty_embed() {
            parsed.embed_text = String::new();
        }

        let completed_at = Utc::now();
        let latency_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        let embed_decision = prepare_embed_text(
            true,
            Some(&parsed),
            ctx.resolved.execution.contract_failure_policy,
            ctx.resolved.measurement.embedding_max_chars,
        );

        let embedding_record = match embed_decision {
            PreparedEmbedText::Skip(reason) => Some(skipped_embedding_record(entry.trial_id, reason)),
            PreparedEmbedText::Ready {
                text,
                original_chars,
                final_chars,
                truncated,
                truncation_reason,
            } => {
                let mut rng = SeededRng::for_stream(ctx.resolved.run.seed, StreamLabel::Embedding, entry.trial_id);
                let dims = 8;
                let vector: Vec<f32> = (0..dims).map(|_| (rng.next_f64() * 2.0 - 1.0) as f32).collect();
                Some(arbiter_types::embedding::EmbeddingRecord {
                    trial_id: entry.trial_id,
                    embedding_status: arbiter_types::embedding::EmbeddingStatus::Success,
                    vector_b64: Some(arbiter_types::embedding::EmbeddingRecord::encode_vector(&vector)),
                    dimensions: Some(dims as u32),
                    embed_text_sha256: Some(arbiter_types::hashing::sha256_hex(text.as_bytes())),
                    embed_text_truncated: truncated,
                    embed_text_original_chars: original_chars,
                    embed_text_final_chars: final_chars,
                    truncation_reason,
                    dtype: "float32".to_string(),
                    encoding: "float32le_base64".to_string(),
                    generation_id: Some(format!("mock-{}", entry.trial_id)),
                    skip_reason: None,
                    error: None,
                })
            }
        };

        let trial = TrialRecord {
            trial_id: entry.trial_id,
            requested_model_slug: entry.assigned_config.model.clone(),
            actual_model: Some(entry.assigned_config.model.clone()),
            protocol: entry.protocol,
            status: TrialStatus::Success,
            assigned_config: entry.assigned_config.clone(),
            calls: vec![call],
            transcript: None,
            raw_assistant_text: raw_text,
            usage: Some(Usage {
                prompt_tokens: 32,
                completion_tokens: 16,
                total_tokens: 48,
                cost_usd: Some(0.0),
            }),
            attempt: Attempt {
                started_at,
                completed_at,
                latency_ms,
                retry_count: 0,
            },
            error: None,
            parsed: Some(parsed),
            embedding: embedding_record.as_ref().map(|e| e.outcome()),
        };

        ExecutedTrial {
            trial,
            embedding: embedding_record,
        }
    }
}

fn skipped_embedding_record(
    trial_id: u32,
    reason: arbiter_types::embedding::SkipReason,
) -> arbiter_types::embedding::EmbeddingRecord {
    arbiter_types::embedding::EmbeddingRecord {
        trial_id,
        embedding_status: arbiter_types::embedding::EmbeddingStatus::Skipped,
        vector_b64: None,
        dimensions: None,
        embed_text_sha256: None,
        embed_text_truncated: false,
        embed_text_original_chars: 0,
        embed_text_final_chars: 0,
        truncation_reason: arbiter_types::embedding::TruncationReason::None,
        dtype: "float32".to_string(),
        encoding: "float32le_base64".to_string(),
        generation_id: None,
        skip_reason: Some(reason),
        error: None,
    }
}
