//! The bounded-concurrency batch executor (§4.5).
//!
//! Launches up to `workers` concurrent trial executions over one batch and
//! returns completed trials in completion order, not submission order.
//! Cooperative cancellation is checked after every completion, and every
//! in-flight call races the shutdown token so a hard-abort deadline actually
//! cuts the in-flight work rather than waiting it out.
//!
//! Uses `futures::stream::FuturesUnordered` rather than `tokio::spawn`/
//! `JoinSet`: the executor and `ExecutionContext` are borrowed, not `'static`,
//! and `FuturesUnordered` can poll borrowed futures to completion within this
//! function's stack frame without forcing callers to `Arc`-wrap them.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use arbiter_executor::{ExecutedTrial, ExecutionContext, TrialExecutor};
use arbiter_types::plan::TrialPlanEntry;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;
use crate::shutdown::ShutdownController;

pub struct BatchOutcome {
    pub executed: Vec<ExecutedTrial>,
    pub elapsed_ms: u64,
}

type BoxedTrial<'a> = Pin<Box<dyn Future<Output = Option<ExecutedTrial>> + Send + 'a>>;

/// Races one trial's execution against the shutdown token. `None` means the
/// token won: the call was hard-aborted mid-flight and never produced a
/// trial record.
async fn run_one<E: TrialExecutor>(
    executor: &E,
    entry: TrialPlanEntry,
    ctx: &ExecutionContext<'_>,
    cancel: CancellationToken,
) -> Option<ExecutedTrial> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        result = executor.execute(entry, ctx) => Some(result),
    }
}

/// Runs one batch to completion per the §4.5 contract. `monitor_should_stop`
/// is polled alongside the shutdown controller after each completion so a
/// just-converged run stops launching new work without waiting for the next
/// batch boundary.
pub async fn run_batch<'a, E: TrialExecutor>(
    entries: &'a [TrialPlanEntry],
    workers: u32,
    executor: &'a E,
    ctx: &'a ExecutionContext<'a>,
    shutdown: &ShutdownController,
    monitor_should_stop: impl Fn() -> bool,
) -> Result<BatchOutcome, OrchestratorError> {
    if workers == 0 {
        return Err(OrchestratorError::ZeroWorkers);
    }

    let started = Instant::now();
    let mut remaining: VecDeque<&'a TrialPlanEntry> = entries.iter().collect();
    let mut in_flight: FuturesUnordered<BoxedTrial<'a>> = FuturesUnordered::new();
    let mut executed = Vec::with_capacity(entries.len());
    let mut stop_launching = false;

    for _ in 0..workers.min(remaining.len() as u32) {
        if let Some(entry) = remaining.pop_front() {
            in_flight.push(Box::pin(run_one(executor, entry.clone(), ctx, shutdown.token())));
        }
    }

    while let Some(result) = in_flight.next().await {
        if let Some(trial) = result {
            executed.push(trial);
        }
        if !stop_launching && (shutdown.is_requested() || monitor_should_stop()) {
            stop_launching = true;
        }
        if !stop_launching {
            if let Some(entry) = remaining.pop_front() {
                in_flight.push(Box::pin(run_one(executor, entry.clone(), ctx, shutdown.token())));
            }
        }
    }

    Ok(BatchOutcome {
        executed,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_executor::MockExecutor;
    use arbiter_types::config::*;
    use arbiter_types::plan::{AssignedConfig, DecodeParams};

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            question_id: "q1".to_string(),
            question_text: "What is the answer?".to_string(),
            sampling: Sampling::default(),
            protocol: ProtocolConfig {
                kind: ProtocolKind::Independent,
                participants: None,
                rounds: None,
                decision_contract: None,
                timeouts: PerCallTimeouts { per_call_timeout_ms: 30_000 },
            },
            execution: Execution {
                k_max: 4,
                batch_size: 4,
                workers: 2,
                k_min: 0,
                k_min_count_rule: KMinCountRule::KEligible,
                stop_mode: StopMode::Disabled,
                stop_policy: StopPolicy { novelty_epsilon: 0.0, similarity_threshold: 1.0, patience: 1 },
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
            run: RunMeta { run_id: "run-test".to_string(), seed: 1 },
        }
    }

    fn entry(trial_id: u32) -> TrialPlanEntry {
        TrialPlanEntry {
            trial_id,
            protocol: ProtocolKind::Independent,
            assigned_config: AssignedConfig {
                model: "mock-model".to_string(),
                persona_id: "neutral".to_string(),
                protocol_id: "default".to_string(),
                decode: DecodeParams { temperature: None, top_p: None, max_tokens: None, seed: 1 },
            },
            role_assignments: None,
        }
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let resolved = resolved();
        let ctx = ExecutionContext { resolved: &resolved, compiled_contract: None };
        let executor = MockExecutor::new();
        let shutdown = ShutdownController::new(30_000);
        let entries = vec![entry(0)];
        let result = run_batch(&entries, 0, &executor, &ctx, &shutdown, || false).await;
        assert!(matches!(result, Err(OrchestratorError::ZeroWorkers)));
    }

    #[tokio::test]
    async fn runs_every_entry_and_returns_all_results() {
        let resolved = resolved();
        let ctx = ExecutionContext { resolved: &resolved, compiled_contract: None };
        let executor = MockExecutor::new();
        let shutdown = ShutdownController::new(30_000);
        let entries: Vec<TrialPlanEntry> = (0..4).map(entry).collect();
        let outcome = run_batch(&entries, 2, &executor, &ctx, &shutdown, || false).await.unwrap();
        assert_eq!(outcome.executed.len(), 4);
        let mut ids: Vec<u32> = outcome.executed.iter().map(|e| e.trial.trial_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn should_stop_halts_further_launches_but_keeps_completed_results() {
        let resolved = resolved();
        let ctx = ExecutionContext { resolved: &resolved, compiled_contract: None };
        let executor = MockExecutor::new();
        let shutdown = ShutdownController::new(30_000);
        let entries: Vec<TrialPlanEntry> = (0..4).map(entry).collect();
        let outcome = run_batch(&entries, 1, &executor, &ctx, &shutdown, || true).await.unwrap();
        assert_eq!(outcome.executed.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_drops_trials_that_never_complete() {
        std::env::set_var("ARBITER_MOCK_DELAY_MS", "200");
        let resolved = resolved();
        let ctx = ExecutionContext { resolved: &resolved, compiled_contract: None };
        let executor = MockExecutor::new();
        let shutdown = ShutdownController::new(30_000);
        shutdown.token().cancel();
        let entries: Vec<TrialPlanEntry> = (0..2).map(entry).collect();
        let outcome = run_batch(&entries, 2, &executor, &ctx, &shutdown, || false).await.unwrap();
        std::env::remove_var("ARBITER_MOCK_DELAY_MS");
        assert_eq!(outcome.executed.len(), 0);
    }
}
