//! Owns the run lifecycle (§4.9): plan announcement, the batch loop,
//! finalization, and the closing `run.completed`/`run.failed` event.

use arbiter_core::EventBus;
use arbiter_executor::{CompiledContract, ExecutionContext, TrialExecutor};
use arbiter_finalizer::FinalizationStatus;
use arbiter_types::config::{ContractFailurePolicy, ResolvedConfig};
use arbiter_types::embedding::{EmbeddingRecord, EmbeddingStatus};
use arbiter_types::events::{
    BatchCompletedPayload, BatchStartedPayload, EmbeddingsFinalizedPayload, EngineEvent, RunCompletedPayload,
    RunFailedPayload, RunStartedPayload, WarningRaisedPayload,
};
use arbiter_types::manifest::StopReason;
use arbiter_types::plan::TrialPlan;
use arbiter_writer::ArtifactWriter;

use crate::batch::run_batch;
use crate::error::OrchestratorError;
use crate::run_monitor::{EligibleEmbedding, RunMonitor};
use crate::shutdown::ShutdownController;

pub struct RunOutcome {
    pub stop_reason: StopReason,
    pub incomplete: bool,
    pub notes: Vec<String>,
}

pub struct RunOrchestrator<'a, E: TrialExecutor> {
    bus: &'a EventBus,
    executor: &'a E,
    writer: &'a ArtifactWriter,
    monitor: RunMonitor,
    shutdown: &'a ShutdownController,
    resolved: &'a ResolvedConfig,
    compiled_contract: Option<&'a CompiledContract>,
}

impl<'a, E: TrialExecutor> RunOrchestrator<'a, E> {
    pub fn new(
        bus: &'a EventBus,
        executor: &'a E,
        writer: &'a ArtifactWriter,
        monitor: RunMonitor,
        shutdown: &'a ShutdownController,
        resolved: &'a ResolvedConfig,
        compiled_contract: Option<&'a CompiledContract>,
    ) -> Self {
        Self {
            bus,
            executor,
            writer,
            monitor,
            shutdown,
            resolved,
            compiled_contract,
        }
    }

    pub async fn run(&mut self, plan: &TrialPlan, debug: bool) -> Result<RunOutcome, OrchestratorError> {
        let run_id = self.resolved.run.run_id.clone();

        self.bus.publish(EngineEvent::RunStarted(RunStartedPayload {
            run_id: run_id.clone(),
            plan_sha256: plan.plan_sha256.clone(),
            k_planned: plan.k_planned(),
            debug,
            resolved_config: self.resolved.clone(),
        }));
        for entry in &plan.entries {
            self.bus.publish(EngineEvent::TrialPlanned(entry.clone()));
        }

        if self.resolved.execution.workers == 0 {
            let err = OrchestratorError::ZeroWorkers;
            self.bus.publish(EngineEvent::RunFailed(RunFailedPayload {
                run_id: run_id.clone(),
                message: err.to_string(),
                error_code: None,
            }));
            return Err(err);
        }

        match self.run_batches(plan).await {
            Ok((stop_reason, mut notes)) => match self.finalize(debug).await {
                Ok(primary) => {
                    notes.extend(primary.notes);
                    let incomplete = matches!(stop_reason, StopReason::UserInterrupt | StopReason::Error);
                    let counts = self.writer.counts();
                    self.bus.publish(EngineEvent::RunCompleted(RunCompletedPayload {
                        run_id,
                        stop_reason,
                        incomplete,
                        k_attempted: counts.k_attempted,
                        k_eligible: counts.k_eligible,
                    }));
                    Ok(RunOutcome {
                        stop_reason,
                        incomplete,
                        notes,
                    })
                }
                Err(err) => {
                    self.bus.publish(EngineEvent::RunFailed(RunFailedPayload {
                        run_id,
                        message: err.to_string(),
                        error_code: None,
                    }));
                    Err(err)
                }
            },
            Err(err) => {
                self.bus.publish(EngineEvent::RunFailed(RunFailedPayload {
                    run_id,
                    message: err.to_string(),
                    error_code: None,
                }));
                Err(err)
            }
        }
    }

    /// Runs every batch in the plan, stopping early on shutdown, monitor
    /// convergence, or a tripped `fail` contract policy. Only a dimension
    /// mismatch (surfaced by the monitor) propagates as `Err`; every other
    /// stop condition resolves to a `StopReason` instead.
    async fn run_batches(&mut self, plan: &TrialPlan) -> Result<(StopReason, Vec<String>), OrchestratorError> {
        let batch_size = self.resolved.execution.batch_size.max(1) as usize;
        let workers = self.resolved.execution.workers;
        let contract_failure_policy = self.resolved.execution.contract_failure_policy;
        let ctx = ExecutionContext {
            resolved: self.resolved,
            compiled_contract: self.compiled_contract,
        };

        let mut stop_reason: Option<StopReason> = None;
        let mut notes = Vec::new();

        for (batch_number, chunk) in plan.entries.chunks(batch_size).enumerate() {
            let batch_number = batch_number as u32;

            if self.shutdown.is_requested() {
                stop_reason = Some(StopReason::UserInterrupt);
                break;
            }
            if self.monitor.should_stop() {
                stop_reason = Some(StopReason::Converged);
                break;
            }

            let trial_ids: Vec<u32> = chunk.iter().map(|e| e.trial_id).collect();
            self.bus.publish(EngineEvent::BatchStarted(BatchStartedPayload { batch_number, trial_ids }));

            let monitor = &self.monitor;
            let outcome = run_batch(chunk, workers, self.executor, &ctx, self.shutdown, || monitor.should_stop()).await?;

            let mut completed_ids: Vec<u32> = Vec::with_capacity(outcome.executed.len());
            let mut eligible_embeddings = Vec::new();
            let batch_k_attempted = outcome.executed.len() as u32;

            for executed in &outcome.executed {
                completed_ids.push(executed.trial.trial_id);
                self.bus.publish(EngineEvent::TrialCompleted(executed.trial.clone()));
                if let Some(parsed) = &executed.trial.parsed {
                    self.bus.publish(EngineEvent::ParsedOutput(parsed.clone()));
                }
                if let Some(embedding) = &executed.embedding {
                    self.bus.publish(EngineEvent::EmbeddingRecorded(embedding.clone()));
                    if embedding.embedding_status == EmbeddingStatus::Success {
                        match embedding.vector_b64.as_deref().map(EmbeddingRecord::decode_vector) {
                            Some(Ok(vector)) => {
                                eligible_embeddings.push(EligibleEmbedding {
                                    trial_id: executed.trial.trial_id,
                                    vector,
                                });
                            }
                            Some(Err(err)) => {
                                self.bus.publish(EngineEvent::WarningRaised(WarningRaisedPayload {
                                    component: "monitor".to_string(),
                                    message: "embedding marked success but vector failed to decode".to_string(),
                                    trial_id: Some(executed.trial.trial_id),
                                    detail: Some(serde_json::json!({ "decode_error": err })),
                                }));
                            }
                            None => {
                                self.bus.publish(EngineEvent::WarningRaised(WarningRaisedPayload {
                                    component: "monitor".to_string(),
                                    message: "embedding marked success with no vector_b64".to_string(),
                                    trial_id: Some(executed.trial.trial_id),
                                    detail: None,
                                }));
                            }
                        }
                    }
                }
            }
            completed_ids.sort_unstable();

            self.bus.publish(EngineEvent::BatchCompleted(BatchCompletedPayload {
                batch_number,
                elapsed_ms: outcome.elapsed_ms,
                completed_trial_ids: completed_ids,
            }));
            self.bus.flush().await;

            self.monitor
                .on_batch_completed(self.bus, batch_number, batch_k_attempted, &eligible_embeddings)?;

            let snapshot = self.writer.contract_failure_snapshot(contract_failure_policy);
            if contract_failure_policy == ContractFailurePolicy::Fail
                && (snapshot.fallback_count + snapshot.failed_count) > 0
            {
                notes.push("contract failure policy `fail` tripped: terminating run".to_string());
                stop_reason = Some(StopReason::Error);
                break;
            }
        }

        let stop_reason = stop_reason.unwrap_or(if plan.entries.is_empty() {
            StopReason::Completed
        } else {
            StopReason::KMaxReached
        });

        Ok((stop_reason, notes))
    }

    async fn finalize(&self, debug: bool) -> Result<FinalizeOutcome, OrchestratorError> {
        let outcome = arbiter_finalizer::finalize(self.writer.paths(), &self.resolved.measurement.embedding_model, debug)?;
        let (status_str, primary_format) = match outcome.provenance.status {
            FinalizationStatus::ArrowGenerated => ("arrow_generated", "arrow"),
            FinalizationStatus::JsonlFallback => ("jsonl_fallback", "jsonl"),
            FinalizationStatus::NotGenerated => ("not_generated", "none"),
        };
        self.bus.publish(EngineEvent::EmbeddingsFinalized(EmbeddingsFinalizedPayload {
            status: status_str.to_string(),
            primary_format: primary_format.to_string(),
            count: outcome.provenance.counts.embedded,
        }));

        let mut notes = Vec::new();
        if let Some(err) = &outcome.provenance.error {
            notes.push(format!("embedding finalization degraded: {err}"));
        }
        Ok(FinalizeOutcome { notes })
    }
}

struct FinalizeOutcome {
    notes: Vec<String>,
}
