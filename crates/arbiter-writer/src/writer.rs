//! `ArtifactWriter`: subscribes to the event bus and turns every event into
//! either an append-only JSONL line or an update to the in-memory manifest
//! accumulator. Atomic artifacts (`config.*.json`, `groups/state.json`,
//! `manifest.json`) are written directly by the caller at the appropriate
//! lifecycle point, not dispatched through the bus.

use std::sync::{Arc, Mutex};

use arbiter_core::{EventBus, SubscriptionId};
use arbiter_types::config::{ContractFailurePolicy, ResolvedConfig};
use arbiter_types::events::EngineEvent;
use arbiter_types::manifest::{ArtifactEntry, ContractFailurePolicySnapshot, RunCounts};
use serde_json::Value;

use crate::accumulator::ManifestAccumulator;
use crate::atomic::write_json_atomic;
use crate::error::WriterError;
use crate::jsonl::JsonlAppender;
use crate::paths::RunPaths;

pub struct ArtifactWriter {
    paths: RunPaths,
    trial_plan: JsonlAppender,
    trials: JsonlAppender,
    monitoring: JsonlAppender,
    debug_embeddings: JsonlAppender,
    groups_assignments: JsonlAppender,
    accumulator: Mutex<ManifestAccumulator>,
}

impl ArtifactWriter {
    /// `debug/embeddings.jsonl` is always opened: it is the finalizer's only
    /// source of full vectors, regardless of `--debug`. Whether it survives
    /// past finalization is the finalizer's post-finalization cleanup
    /// decision, not a decision made here.
    pub fn new(run_dir: impl Into<std::path::PathBuf>, k_planned: u32) -> Result<Arc<Self>, WriterError> {
        let paths = RunPaths::new(run_dir.into());
        std::fs::create_dir_all(paths.root()).map_err(|source| WriterError::CreateDir {
            path: paths.root().display().to_string(),
            source,
        })?;

        let trial_plan = JsonlAppender::open(paths.trial_plan_jsonl())?;
        let trials = JsonlAppender::open(paths.trials_jsonl())?;
        let monitoring = JsonlAppender::open(paths.monitoring_jsonl())?;
        let debug_embeddings = JsonlAppender::open(paths.debug_embeddings_jsonl())?;
        let groups_assignments = JsonlAppender::open(paths.groups_assignments_jsonl())?;

        Ok(Arc::new(Self {
            paths,
            trial_plan,
            trials,
            monitoring,
            debug_embeddings,
            groups_assignments,
            accumulator: Mutex::new(ManifestAccumulator::new(k_planned)),
        }))
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Registers one sync handler per event kind this writer cares about.
    /// Each handler logs (via `tracing::warn`) and swallows its own IO
    /// errors rather than panicking — a panic would become a `HandlerWarning`
    /// on the bus anyway, but artifact writes should never abort dispatch to
    /// the other subscribers (the monitor, in particular).
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        let mut ids = Vec::new();

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::TrialPlanned(entry) = &envelope.event {
                if let Err(err) = writer.trial_plan.append(entry) {
                    tracing::warn!(target: "arbiter.writer", %err, "failed to append trial_plan.jsonl");
                }
            }
        }));

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::TrialCompleted(record) = &envelope.event {
                if let Err(err) = writer.trials.append(record) {
                    tracing::warn!(target: "arbiter.writer", %err, "failed to append trials.jsonl");
                }
                writer
                    .accumulator
                    .lock()
                    .expect("accumulator mutex poisoned")
                    .record_trial(record);
            }
        }));

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::ConvergenceRecord(record) = &envelope.event {
                if let Err(err) = writer.monitoring.append(record) {
                    tracing::warn!(target: "arbiter.writer", %err, "failed to append monitoring.jsonl");
                }
            }
        }));

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::EmbeddingRecorded(record) = &envelope.event {
                if let Err(err) = writer.debug_embeddings.append(record) {
                    tracing::warn!(target: "arbiter.writer", %err, "failed to append debug/embeddings.jsonl");
                }
            }
        }));

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::ClusterAssigned(assignment) = &envelope.event {
                if let Err(err) = writer.groups_assignments.append(assignment) {
                    tracing::warn!(target: "arbiter.writer", %err, "failed to append groups/assignments.jsonl");
                }
            }
        }));

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::ClustersState(snapshot) = &envelope.event {
                if let Err(err) = write_json_atomic(&writer.paths.groups_state_json(), snapshot) {
                    tracing::warn!(target: "arbiter.writer", %err, "failed to write groups/state.json");
                }
            }
        }));

        let writer = self.clone();
        ids.push(bus.subscribe_sync(move |envelope| {
            if let EngineEvent::BatchCompleted(_) = &envelope.event {
                writer
                    .accumulator
                    .lock()
                    .expect("accumulator mutex poisoned")
                    .record_batch_completed();
            }
        }));

        ids
    }

    pub fn write_source_config(&self, raw: &Value) -> Result<(), WriterError> {
        write_json_atomic(&self.paths.config_source_json(), raw)
    }

    pub fn write_resolved_config(&self, config: &ResolvedConfig) -> Result<(), WriterError> {
        write_json_atomic(&self.paths.config_resolved_json(), config)
    }

    pub fn counts(&self) -> RunCounts {
        self.accumulator.lock().expect("accumulator mutex poisoned").counts()
    }

    pub fn usage_totals(&self) -> std::collections::HashMap<String, arbiter_types::trial::Usage> {
        self.accumulator
            .lock()
            .expect("accumulator mutex poisoned")
            .usage_totals()
    }

    pub fn contract_failure_snapshot(
        &self,
        policy: ContractFailurePolicy,
    ) -> ContractFailurePolicySnapshot {
        self.accumulator
            .lock()
            .expect("accumulator mutex poisoned")
            .contract_failure_snapshot(policy)
    }

    /// Sizes+hashes a just-written artifact for the manifest's `artifacts`
    /// list. Missing files (e.g. `debug/embeddings.jsonl` when `--debug` is
    /// off) are simply omitted by the caller rather than erroring here.
    pub fn describe_artifact(path: &std::path::Path, kind: &str) -> Option<ArtifactEntry> {
        let bytes = std::fs::metadata(path).ok()?.len();
        let contents = std::fs::read(path).ok()?;
        Some(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.to_string(),
            sha256: Some(arbiter_types::hashing::sha256_hex(&contents)),
            bytes: Some(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::events::{RunStartedPayload, WorkerStatusPayload};

    fn sample_run_started() -> EngineEvent {
        EngineEvent::RunStarted(RunStartedPayload {
            run_id: "run-1".to_string(),
            plan_sha256: "deadbeef".to_string(),
            k_planned: 1,
            debug: false,
            resolved_config: crate::tests_support::sample_resolved_config(),
        })
    }

    #[test]
    fn attach_ignores_event_kinds_it_does_not_own() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path(), 1).unwrap();
        let bus = EventBus::new();
        writer.attach(&bus);
        bus.publish(sample_run_started());
        bus.publish(EngineEvent::WorkerStatus(WorkerStatusPayload {
            worker_index: 0,
            state: arbiter_types::events::WorkerState::Idle,
            trial_id: None,
        }));
        assert_eq!(std::fs::read_to_string(writer.paths().trials_jsonl()).unwrap(), "");
    }

    #[test]
    fn debug_embeddings_jsonl_is_always_opened_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path(), 1).unwrap();
        assert!(writer.paths().debug_embeddings_jsonl().exists());
    }
}
