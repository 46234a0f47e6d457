//! End-to-end scenarios over `arbiter_orchestrator::service::run`: a full
//! wiring of the bus, writer, monitor, and orchestrator against a real
//! `tempfile` run directory, exercised with purpose-built executors rather
//! than `MockExecutor` so embeddings are exact rather than seeded-random.

use std::sync::atomic::{AtomicU32, Ordering};

use arbiter_executor::{ExecutedTrial, ExecutionContext, TrialExecutor};
use arbiter_orchestrator::{RunOptions, ShutdownController};
use arbiter_types::config::*;
use arbiter_types::embedding::{EmbeddingRecord, EmbeddingStatus, TruncationReason};
use arbiter_types::manifest::StopReason;
use arbiter_types::plan::TrialPlanEntry;
use arbiter_types::trial::{Attempt, TrialRecord, TrialStatus, Usage};

fn resolved(k_max: u32, batch_size: u32, workers: u32, k_min: u32, stop_policy: StopPolicy) -> ResolvedConfig {
    ResolvedConfig {
        question_id: "q1".to_string(),
        question_text: "What is the answer?".to_string(),
        sampling: Sampling {
            models: vec![WeightedEntry { id: "mock-model".to_string(), weight: 1.0 }],
            personas: vec![WeightedEntry { id: "neutral".to_string(), weight: 1.0 }],
            protocols: vec![WeightedEntry { id: "default".to_string(), weight: 1.0 }],
            instruments: Vec::new(),
            decode: DecodeRanges::default(),
        },
        protocol: ProtocolConfig {
            kind: ProtocolKind::Independent,
            participants: None,
            rounds: None,
            decision_contract: None,
            timeouts: PerCallTimeouts { per_call_timeout_ms: 30_000 },
        },
        execution: Execution {
            k_max,
            batch_size,
            workers,
            k_min,
            k_min_count_rule: KMinCountRule::KEligible,
            stop_mode: StopMode::Enforcer,
            stop_policy,
            retry_policy: RetryPolicy::default(),
            contract_failure_policy: ContractFailurePolicy::default(),
        },
        measurement: Measurement {
            embedding_model: "test-embed".to_string(),
            embed_text_strategy: EmbedTextStrategy::OutcomeOnly,
            embedding_max_chars: 1000,
            clustering: ClusteringConfig {
                enabled: true,
                tau: 0.9,
                centroid_update_rule: CentroidUpdateRule::FixedLeader,
                cluster_limit: 16,
                stop_mode: StopMode::Enforcer,
            },
        },
        run: RunMeta { run_id: "run-test".to_string(), seed: 1 },
    }
}

fn embedding_record(trial_id: u32, vector: &[f32]) -> EmbeddingRecord {
    EmbeddingRecord {
        trial_id,
        embedding_status: EmbeddingStatus::Success,
        vector_b64: Some(EmbeddingRecord::encode_vector(vector)),
        dimensions: Some(vector.len() as u32),
        embed_text_sha256: Some("deadbeef".to_string()),
        embed_text_truncated: false,
        embed_text_original_chars: 10,
        embed_text_final_chars: 10,
        truncation_reason: TruncationReason::None,
        dtype: "float32".to_string(),
        encoding: "float32le_base64".to_string(),
        generation_id: Some(format!("fixed-{trial_id}")),
        skip_reason: None,
        error: None,
    }
}

fn trial_record(entry: &TrialPlanEntry, embedding: &EmbeddingRecord) -> TrialRecord {
    let now = chrono::Utc::now();
    TrialRecord {
        trial_id: entry.trial_id,
        requested_model_slug: entry.assigned_config.model.clone(),
        actual_model: Some(entry.assigned_config.model.clone()),
        protocol: entry.protocol,
        status: TrialStatus::Success,
        assigned_config: entry.assigned_config.clone(),
        calls: Vec::new(),
        transcript: None,
        raw_assistant_text: "fixed answer".to_string(),
        usage: Some(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15, cost_usd: Some(0.0) }),
        attempt: Attempt { started_at: now, completed_at: now, latency_ms: 0, retry_count: 0 },
        error: None,
        parsed: None,
        embedding: Some(embedding.outcome()),
    }
}

/// Every trial gets the identical embedding vector, so clustering converges
/// as fast as `tau`/`patience` allow.
struct IdenticalVectorExecutor;

impl TrialExecutor for IdenticalVectorExecutor {
    async fn execute(&self, entry: TrialPlanEntry, _ctx: &ExecutionContext<'_>) -> ExecutedTrial {
        let embedding = embedding_record(entry.trial_id, &[1.0, 0.0, 0.0, 0.0]);
        ExecutedTrial { trial: trial_record(&entry, &embedding), embedding: Some(embedding) }
    }
}

/// Never completes until aborted by the shutdown token's hard deadline.
struct HangingExecutor {
    completed_before_hang: u32,
    calls: AtomicU32,
}

impl TrialExecutor for HangingExecutor {
    async fn execute(&self, entry: TrialPlanEntry, _ctx: &ExecutionContext<'_>) -> ExecutedTrial {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_index >= self.completed_before_hang {
            std::future::pending::<()>().await;
        }
        let embedding = embedding_record(entry.trial_id, &[1.0, 0.0, 0.0, 0.0]);
        ExecutedTrial { trial: trial_record(&entry, &embedding), embedding: Some(embedding) }
    }
}

#[tokio::test]
async fn converges_before_k_max_on_identical_embeddings() {
    let dir = tempfile::tempdir().unwrap();
    let config = resolved(
        40,
        5,
        4,
        2,
        StopPolicy { novelty_epsilon: 0.0, similarity_threshold: 0.9, patience: 1 },
    );
    let executor = IdenticalVectorExecutor;
    let mut options = RunOptions::new(dir.path());
    options.listen_for_signals = false;

    let report = arbiter_orchestrator::run(&config, &serde_json::json!({}), &executor, options)
        .await
        .unwrap();

    assert_eq!(report.manifest.stop_reason, StopReason::Converged);
    assert!(!report.manifest.incomplete);
    assert!(report.manifest.counts.k_attempted < 40);
    assert!(report.manifest.counts.batches_run >= 2);
    assert!(report.succeeded());

    let assignments = std::fs::read_to_string(dir.path().join("groups/assignments.jsonl")).unwrap();
    assert!(!assignments.is_empty());
    let state = std::fs::read_to_string(dir.path().join("groups/state.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert!(parsed.get("clusters").is_some());
}

#[tokio::test]
async fn user_interrupt_mid_run_stops_with_partial_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = resolved(
        20,
        5,
        5,
        0,
        StopPolicy { novelty_epsilon: 0.0, similarity_threshold: 1.0, patience: 100 },
    );
    let executor = HangingExecutor { completed_before_hang: 5, calls: AtomicU32::new(0) };
    let shutdown = ShutdownController::new(20);
    let mut options = RunOptions::new(dir.path());
    options.listen_for_signals = false;
    options.shutdown = Some(shutdown.clone());

    // Interrupt after the first wave of calls has had a chance to launch.
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            shutdown.request();
        }
    });

    let report = arbiter_orchestrator::run(&config, &serde_json::json!({}), &executor, options)
        .await
        .unwrap();

    assert!(report.manifest.counts.k_attempted >= 1);
    assert!(report.manifest.counts.k_attempted < 20);

    let trials = std::fs::read_to_string(dir.path().join("trials.jsonl")).unwrap();
    assert!(trials.lines().count() >= 1);
}
