//! Top-level run entry point (§4.9, §6): wires the event bus, artifact
//! writer, monitor, shutdown controller, and run orchestrator together for
//! one run and always produces a `manifest.json`.
//!
//! `Err` is reserved for bootstrap failures — anything before
//! `RunOrchestrator::run` is even called (writer setup, an invalid decision
//! contract). Once the lifecycle starts, this function always resolves to
//! `Ok(RunReport)`: a run-level failure is recorded as
//! `stop_reason = error`/`incomplete = true` in the manifest rather than
//! surfaced as `Result::Err`, since the manifest must exist either way.

use std::path::PathBuf;
use std::sync::Arc;

use arbiter_core::{build_plan, EventBus};
use arbiter_executor::{CompiledContract, TrialExecutor};
use arbiter_types::config::ResolvedConfig;
use arbiter_types::manifest::{RunManifest, StopReason};
use arbiter_writer::ArtifactWriter;
use chrono::Utc;
use serde_json::Value;

use crate::error::OrchestratorError;
use crate::manifest::{build_and_write, ManifestInputs};
use crate::run_monitor::RunMonitor;
use crate::run_orchestrator::RunOrchestrator;
use crate::shutdown::{ShutdownController, DEFAULT_DEADLINE_MS};

/// Inputs that don't live on `ResolvedConfig` itself: where to write, and how
/// the run should behave operationally.
pub struct RunOptions {
    pub run_dir: PathBuf,
    pub debug: bool,
    pub shutdown_deadline_ms: u64,
    /// Installs the SIGINT/SIGTERM listener. Off in tests, where the caller
    /// drives `ShutdownController::request` directly instead.
    pub listen_for_signals: bool,
    /// Supplies an already-constructed controller instead of building one
    /// from `shutdown_deadline_ms`, so a caller (a CLI's own signal handling,
    /// or a test) can hold the handle and call `request()` on it directly.
    pub shutdown: Option<Arc<ShutdownController>>,
}

impl RunOptions {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            debug: false,
            shutdown_deadline_ms: DEFAULT_DEADLINE_MS,
            listen_for_signals: true,
            shutdown: None,
        }
    }
}

pub struct RunReport {
    pub manifest: RunManifest,
    pub run_dir: PathBuf,
}

impl RunReport {
    /// `false` if the run stopped early on a user interrupt or a tripped
    /// error policy; `true` otherwise (including `k_max_reached`).
    pub fn succeeded(&self) -> bool {
        !self.manifest.incomplete && self.manifest.stop_reason != StopReason::Error
    }
}

/// Runs one question end to end: plans trials, executes them through
/// `executor`, monitors and writes artifacts as it goes, and returns a
/// `RunReport` wrapping the final manifest.
pub async fn run<E: TrialExecutor>(
    resolved: &ResolvedConfig,
    raw_source_config: &Value,
    executor: &E,
    options: RunOptions,
) -> Result<RunReport, OrchestratorError> {
    let started_at = Utc::now();
    let plan = build_plan(resolved);

    let writer = ArtifactWriter::new(&options.run_dir, plan.k_planned())?;
    writer.write_source_config(raw_source_config)?;
    writer.write_resolved_config(resolved)?;

    let compiled_contract = match &resolved.protocol.decision_contract {
        Some(contract) => Some(CompiledContract::compile(contract.clone()).map_err(OrchestratorError::Contract)?),
        None => None,
    };

    let bus = EventBus::new();
    writer.attach(&bus);

    let clustering = &resolved.measurement.clustering;
    let monitor = RunMonitor::new(
        clustering.enabled,
        clustering.tau,
        clustering.centroid_update_rule,
        clustering.cluster_limit,
        clustering.stop_mode,
        resolved.execution.stop_policy.clone(),
        resolved.execution.k_min,
        resolved.execution.k_min_count_rule,
    );

    let shutdown = options
        .shutdown
        .clone()
        .unwrap_or_else(|| ShutdownController::new(options.shutdown_deadline_ms));
    let listener = options.listen_for_signals.then(|| tokio::spawn(shutdown.clone().listen()));

    let mut orchestrator = RunOrchestrator::new(
        &bus,
        executor,
        &writer,
        monitor,
        &shutdown,
        resolved,
        compiled_contract.as_ref(),
    );

    let outcome = orchestrator.run(&plan, options.debug).await;
    bus.flush().await;

    if let Some(listener) = listener {
        listener.abort();
    }

    let (stop_reason, incomplete, notes) = match &outcome {
        Ok(outcome) => (outcome.stop_reason, outcome.incomplete, outcome.notes.clone()),
        Err(_) => (StopReason::Error, true, Vec::new()),
    };

    let manifest = build_and_write(ManifestInputs {
        run_id: resolved.run.run_id.clone(),
        started_at,
        completed_at: Some(Utc::now()),
        stop_reason,
        incomplete,
        config_sha256: resolved.content_sha256(),
        plan_sha256: plan.plan_sha256.clone(),
        stop_policy: resolved.execution.stop_policy.clone(),
        contract_failure_policy: resolved.execution.contract_failure_policy,
        notes,
        writer: &writer,
    })?;

    Ok(RunReport {
        manifest,
        run_dir: options.run_dir,
    })
}
