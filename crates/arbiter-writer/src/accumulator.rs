//! Accumulates the running totals a `trial.completed`/`batch.completed`
//! stream needs to settle into a `RunManifest` at the end of the run,
//! without re-reading `trials.jsonl` back off disk.

use std::collections::HashMap;

use arbiter_types::config::ContractFailurePolicy;
use arbiter_types::embedding::EmbeddingStatus;
use arbiter_types::manifest::{ContractFailurePolicySnapshot, RunCounts};
use arbiter_types::parsed::{ParseStatus, ParsedOutputRecord};
use arbiter_types::trial::{TrialRecord, Usage};

#[derive(Debug, Default)]
pub struct ManifestAccumulator {
    counts: RunCounts,
    usage_totals: HashMap<String, Usage>,
    fallback_count: u32,
    failed_count: u32,
}

impl ManifestAccumulator {
    pub fn new(k_planned: u32) -> Self {
        Self {
            counts: RunCounts {
                k_planned,
                ..RunCounts::default()
            },
            ..Self::default()
        }
    }

    pub fn record_trial(&mut self, trial: &TrialRecord) {
        self.counts.k_attempted += 1;
        let embedded_ok = trial
            .embedding
            .as_ref()
            .map_or(false, |e| e.embedding_status == EmbeddingStatus::Success);
        if embedded_ok {
            self.counts.k_eligible += 1;
        }

        if let Some(usage) = &trial.usage {
            let slug = trial.actual_model.clone().unwrap_or_else(|| trial.requested_model_slug.clone());
            let entry = self.usage_totals.entry(slug).or_default();
            entry.prompt_tokens += usage.prompt_tokens;
            entry.completion_tokens += usage.completion_tokens;
            entry.total_tokens += usage.total_tokens;
            entry.cost_usd = match (entry.cost_usd, usage.cost_usd) {
                (Some(a), Some(b)) => Some(a + b),
                (existing, None) => existing,
                (None, Some(b)) => Some(b),
            };
        }

        if let Some(parsed) = &trial.parsed {
            self.record_parsed(parsed);
        }
    }

    fn record_parsed(&mut self, parsed: &ParsedOutputRecord) {
        match parsed.parse_status {
            ParseStatus::Fallback => self.fallback_count += 1,
            ParseStatus::Failed => self.failed_count += 1,
            ParseStatus::Success => {}
        }
    }

    pub fn record_batch_completed(&mut self) {
        self.counts.batches_run += 1;
    }

    pub fn counts(&self) -> RunCounts {
        self.counts.clone()
    }

    pub fn usage_totals(&self) -> HashMap<String, Usage> {
        self.usage_totals.clone()
    }

    pub fn contract_failure_snapshot(
        &self,
        policy: ContractFailurePolicy,
    ) -> ContractFailurePolicySnapshot {
        ContractFailurePolicySnapshot {
            policy,
            fallback_count: self.fallback_count,
            failed_count: self.failed_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::config::ProtocolKind;
    use arbiter_types::embedding::{EmbeddingOutcome, TruncationReason};
    use arbiter_types::plan::{AssignedConfig, DecodeParams};
    use arbiter_types::trial::{Attempt, TrialStatus};
    use chrono::Utc;

    fn sample_embedding(status: EmbeddingStatus) -> EmbeddingOutcome {
        EmbeddingOutcome {
            embedding_status: status,
            dimensions: Some(8),
            embed_text_sha256: Some("abc".to_string()),
            embed_text_truncated: false,
            embed_text_original_chars: 10,
            embed_text_final_chars: 10,
            truncation_reason: TruncationReason::None,
            generation_id: None,
            skip_reason: None,
            error: None,
        }
    }

    fn sample_trial(status: TrialStatus, usage: Option<Usage>) -> TrialRecord {
        sample_trial_with_embedding(status, usage, None)
    }

    fn sample_trial_with_embedding(
        status: TrialStatus,
        usage: Option<Usage>,
        embedding: Option<EmbeddingOutcome>,
    ) -> TrialRecord {
        TrialRecord {
            trial_id: 0,
            requested_model_slug: "model-a".to_string(),
            actual_model: None,
            protocol: ProtocolKind::Independent,
            status,
            assigned_config: AssignedConfig {
                model: "model-a".to_string(),
                persona_id: "neutral".to_string(),
                protocol_id: "default".to_string(),
                decode: DecodeParams {
                    temperature: None,
                    top_p: None,
                    max_tokens: None,
                    seed: 1,
                },
            },
            calls: Vec::new(),
            transcript: None,
            raw_assistant_text: String::new(),
            usage,
            attempt: Attempt {
                started_at: Utc::now(),
                completed_at: Utc::now(),
                latency_ms: 0,
                retry_count: 0,
            },
            error: None,
            parsed: None,
            embedding,
        }
    }

    #[test]
    fn eligibility_follows_embedding_success_not_trial_success() {
        let mut acc = ManifestAccumulator::new(10);
        acc.record_trial(&sample_trial_with_embedding(
            TrialStatus::Success,
            None,
            Some(sample_embedding(EmbeddingStatus::Success)),
        ));
        acc.record_trial(&sample_trial_with_embedding(
            TrialStatus::Success,
            None,
            Some(sample_embedding(EmbeddingStatus::Failed)),
        ));
        acc.record_trial(&sample_trial_with_embedding(TrialStatus::Error, None, None));
        let counts = acc.counts();
        assert_eq!(counts.k_attempted, 3);
        assert_eq!(counts.k_eligible, 1);
    }

    #[test]
    fn trial_without_embedding_outcome_is_not_eligible() {
        let mut acc = ManifestAccumulator::new(10);
        acc.record_trial(&sample_trial(TrialStatus::Success, None));
        let counts = acc.counts();
        assert_eq!(counts.k_attempted, 1);
        assert_eq!(counts.k_eligible, 0);
    }

    #[test]
    fn usage_accumulates_per_model_slug() {
        let mut acc = ManifestAccumulator::new(10);
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            cost_usd: Some(0.01),
        };
        acc.record_trial(&sample_trial(TrialStatus::Success, Some(usage.clone())));
        acc.record_trial(&sample_trial(TrialStatus::Success, Some(usage)));
        let totals = acc.usage_totals();
        let entry = &totals["model-a"];
        assert_eq!(entry.total_tokens, 30);
        assert_eq!(entry.cost_usd, Some(0.02));
    }
}
