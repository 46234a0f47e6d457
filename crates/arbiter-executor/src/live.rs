//! Live trial executor: calls a real completion (and embedding) provider.

use std::time::Duration;

use arbiter_providers::{ChatMessage as ProviderMessage, CompletionRequest, EmbeddingRequest, OpenRouterClient, ProviderError};
use arbiter_types::config::{ProtocolKind, RetryPolicy};
use arbiter_types::embedding::{EmbeddingRecord, EmbeddingStatus};
use arbiter_types::plan::TrialPlanEntry;
use arbiter_types::trial::{Attempt, CallMessage, CallRecord, TrialError, TrialRecord, TrialStatus, Usage};
use chrono::Utc;

use crate::contract::parse_trial_output;
use crate::embed::{prepare_embed_text, PreparedEmbedText};
use crate::executor::{ExecutedTrial, ExecutionContext, TrialExecutor};
use crate::messages::{build_debate_turn, build_independent_messages, PriorTurn};

pub struct LiveExecutor {
    client: OpenRouterClient,
}

impl LiveExecutor {
    pub fn new(client: OpenRouterClient) -> Self {
        Self { client }
    }

    async fn complete_with_retry(
        &self,
        model: &str,
        messages: Vec<CallMessage>,
        decode: &arbiter_types::plan::DecodeParams,
        timeout_ms: u64,
        retry_policy: &RetryPolicy,
    ) -> (Result<arbiter_providers::CompletionResponse, ProviderError>, u32) {
        let provider_messages: Vec<ProviderMessage> = messages
            .iter()
            .map(|m| ProviderMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        let mut attempt = 0;
        loop {
            let request = CompletionRequest {
                model: model.to_string(),
                messages: provider_messages.clone(),
                decode: decode.clone(),
            };
            let result = self
                .client
                .complete(request, Duration::from_millis(timeout_ms))
                .await;

            match &result {
                Ok(_) => return (result, attempt),
                Err(err) if err.is_model_unavailable() => return (result, attempt),
                Err(_) if attempt >= retry_policy.max_retries => return (result, attempt),
                Err(_) => {
                    let backoff = if retry_policy.exponential {
                        retry_policy.backoff_ms.saturating_mul(1u64 << attempt)
                    } else {
                        retry_policy.backoff_ms
                    };
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }

}

impl TrialExecutor for LiveExecutor {
    async fn execute(&self, entry: TrialPlanEntry, ctx: &ExecutionContext<'_>) -> ExecutedTrial {
        let started_at = Utc::now();
        let timeout_ms = ctx.resolved.protocol.timeouts.per_call_timeout_ms;
        let retry_policy = &ctx.resolved.execution.retry_policy;

        let turn_count = match entry.protocol {
            ProtocolKind::Independent => 1,
            ProtocolKind::DebateV1 => 3,
        };

        let mut calls = Vec::new();
        let mut prior_turns: Vec<PriorTurn> = Vec::new();
        let mut total_retries = 0u32;
        let mut last_error: Option<ProviderError> = None;
        let mut last_usage = Usage::default();
        let mut actual_model = None;
        let mut final_response_text = String::new();
        let mut timed_out_once = false;

        for turn in 0..turn_count {
            let (role_label, messages) = match entry.protocol {
                ProtocolKind::Independent => (
                    "solo".to_string(),
                    build_independent_messages(&entry, ctx.resolved, ctx.compiled_contract),
                ),
                ProtocolKind::DebateV1 => {
                    build_debate_turn(turn, &entry, ctx.resolved, ctx.compiled_contract, &prior_turns)
                }
            };

            let (result, retries) = self
                .complete_with_retry(
                    &entry.assigned_config.model,
                    messages.clone(),
                    &entry.assigned_config.decode,
                    timeout_ms,
                    retry_policy,
                )
                .await;
            total_retries += retries;

            match result {
                Ok(response) => {
                    final_response_text = response.content.clone();
                    actual_model = response.actual_model.clone();
                    last_usage = response.usage.clone();
                    calls.push(CallRecord {
                        turn,
                        role_label: role_label.clone(),
                        messages: messages
                            .into_iter()
                            .chain(std::iter::once(CallMessage {
                                role: arbiter_types::trial::MessageRole::Assistant,
                                content: response.content.clone(),
                            }))
                            .collect(),
                        response_text: response.content.clone(),
                    });
                    prior_turns.push(PriorTurn {
                        role_label,
                        response_text: response.content,
                    });
                }
                Err(err) => {
                    timed_out_once = matches!(err, ProviderError::Timeout(_));
                    last_error = Some(err);
                    break;
                }
            }
        }

        let completed_at = Utc::now();
        let latency_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        let status = if let Some(err) = &last_error {
            if timed_out_once {
                TrialStatus::TimeoutExhausted
            } else if err.is_model_unavailable() {
                TrialStatus::ModelUnavailable
            } else {
                TrialStatus::Error
            }
        } else {
            TrialStatus::Success
        };

        let error_record = last_error.as_ref().map(|err| TrialError {
            category: err.category().to_string(),
            message: err.to_string(),
            http_status: err.http_status(),
            provider_error_code: None,
        });

        let parsed = if status == TrialStatus::Success {
            Some(parse_trial_output(
                entry.trial_id,
                &final_response_text,
                ctx.compiled_contract,
            ))
        } else {
            None
        };

        let embed_decision = prepare_embed_text(
            status == TrialStatus::Success,
            parsed.as_ref(),
            ctx.resolved.execution.contract_failure_policy,
            ctx.resolved.measurement.embedding_max_chars,
        );

        let embedding_record = match embed_decision {
            PreparedEmbedText::Skip(reason) => Some(EmbeddingRecord {
                trial_id: entry.trial_id,
                embedding_status: EmbeddingStatus::Skipped,
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
            }),
            PreparedEmbedText::Ready {
                text,
                original_chars,
                final_chars,
                truncated,
                truncation_reason,
            } => {
                let embed_request = EmbeddingRequest {
                    model: ctx.resolved.measurement.embedding_model.clone(),
                    input: vec![text.clone()],
                };
                match self
                    .client
                    .embed(embed_request, Duration::from_millis(timeout_ms))
                    .await
                {
                    Ok(response) => response.vectors.first().map(|vector| EmbeddingRecord {
                        trial_id: entry.trial_id,
                        embedding_status: EmbeddingStatus::Success,
                        vector_b64: Some(EmbeddingRecord::encode_vector(vector)),
                        dimensions: Some(vector.len() as u32),
                        embed_text_sha256: Some(arbiter_types::hashing::sha256_hex(text.as_bytes())),
                        embed_text_truncated: truncated,
                        embed_text_original_chars: original_chars,
                        embed_text_final_chars: final_chars,
                        truncation_reason,
                        dtype: "float32".to_string(),
                        encoding: "float32le_base64".to_string(),
                        generation_id: None,
                        skip_reason: None,
                        error: None,
                    }),
                    Err(err) => Some(EmbeddingRecord {
                        trial_id: entry.trial_id,
                        embedding_status: EmbeddingStatus::Failed,
                        vector_b64: None,
                        dimensions: None,
                        embed_text_sha256: Some(arbiter_types::hashing::sha256_hex(text.as_bytes())),
                        embed_text_truncated: truncated,
                        embed_text_original_chars: original_chars,
                        embed_text_final_chars: final_chars,
                        truncation_reason,
                        dtype: "float32".to_string(),
                        encoding: "float32le_base64".to_string(),
                        generation_id: None,
                        skip_reason: None,
                        error: Some(err.to_string()),
                    }),
                }
            }
        };

        let trial = TrialRecord {
            trial_id: entry.trial_id,
            requested_model_slug: entry.assigned_config.model.clone(),
            actual_model,
            protocol: entry.protocol,
            status,
            assigned_config: entry.assigned_config.clone(),
            calls,
            transcript: None,
            raw_assistant_text: final_response_text,
            usage: Some(last_usage),
            attempt: Attempt {
                started_at,
                completed_at,
                latency_ms,
                retry_count: total_retries,
            },
            error: error_record,
            parsed,
            embedding: embedding_record.as_ref().map(|e| e.outcome()),
        };

        ExecutedTrial {
            trial,
            embedding: embedding_record,
        }
    }
}
