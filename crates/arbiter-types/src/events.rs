//! The closed event-kind union the engine publishes on its bus (§4.3).
//!
//! Modeled as a tagged union so subscribers dispatch on the `kind` tag;
//! an unmatched tag is a compile error, not a runtime branch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cluster::{ClusterAssignment, ClusterStateSnapshot};
use crate::config::ResolvedConfig;
use crate::convergence::ConvergenceTraceRecord;
use crate::embedding::EmbeddingRecord;
use crate::manifest::{ArtifactEntry, StopReason};
use crate::parsed::ParsedOutputRecord;
use crate::plan::TrialPlanEntry;
use crate::trial::TrialRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStartedPayload {
    pub run_id: String,
    pub plan_sha256: String,
    pub k_planned: u32,
    pub debug: bool,
    pub resolved_config: ResolvedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompletedPayload {
    pub run_id: String,
    pub stop_reason: StopReason,
    pub incomplete: bool,
    pub k_attempted: u32,
    pub k_eligible: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailedPayload {
    pub run_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStartedPayload {
    pub batch_number: u32,
    pub trial_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCompletedPayload {
    pub batch_number: u32,
    pub elapsed_ms: u64,
    pub completed_trial_ids: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Busy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusPayload {
    pub worker_index: u32,
    pub state: WorkerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsFinalizedPayload {
    pub status: String,
    pub primary_format: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactWrittenPayload {
    pub entry: ArtifactEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningRaisedPayload {
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    #[serde(rename = "run.started")]
    RunStarted(RunStartedPayload),
    #[serde(rename = "run.completed")]
    RunCompleted(RunCompletedPayload),
    #[serde(rename = "run.failed")]
    RunFailed(RunFailedPayload),
    #[serde(rename = "batch.started")]
    BatchStarted(BatchStartedPayload),
    #[serde(rename = "batch.completed")]
    BatchCompleted(BatchCompletedPayload),
    #[serde(rename = "worker.status")]
    WorkerStatus(WorkerStatusPayload),
    #[serde(rename = "trial.planned")]
    TrialPlanned(TrialPlanEntry),
    #[serde(rename = "trial.completed")]
    TrialCompleted(TrialRecord),
    #[serde(rename = "parsed.output")]
    ParsedOutput(ParsedOutputRecord),
    #[serde(rename = "embedding.recorded")]
    EmbeddingRecorded(EmbeddingRecord),
    #[serde(rename = "embeddings.finalized")]
    EmbeddingsFinalized(EmbeddingsFinalizedPayload),
    #[serde(rename = "cluster.assigned")]
    ClusterAssigned(ClusterAssignment),
    #[serde(rename = "clusters.state")]
    ClustersState(ClusterStateSnapshot),
    #[serde(rename = "convergence.record")]
    ConvergenceRecord(ConvergenceTraceRecord),
    #[serde(rename = "artifact.written")]
    ArtifactWritten(ArtifactWrittenPayload),
    #[serde(rename = "warning.raised")]
    WarningRaised(WarningRaisedPayload),
}

impl EngineEvent {
    /// The dotted event-kind tag, e.g. `"trial.completed"`.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::RunStarted(_) => "run.started",
            EngineEvent::RunCompleted(_) => "run.completed",
            EngineEvent::RunFailed(_) => "run.failed",
            EngineEvent::BatchStarted(_) => "batch.started",
            EngineEvent::BatchCompleted(_) => "batch.completed",
            EngineEvent::WorkerStatus(_) => "worker.status",
            EngineEvent::TrialPlanned(_) => "trial.planned",
            EngineEvent::TrialCompleted(_) => "trial.completed",
            EngineEvent::ParsedOutput(_) => "parsed.output",
            EngineEvent::EmbeddingRecorded(_) => "embedding.recorded",
            EngineEvent::EmbeddingsFinalized(_) => "embeddings.finalized",
            EngineEvent::ClusterAssigned(_) => "cluster.assigned",
            EngineEvent::ClustersState(_) => "clusters.state",
            EngineEvent::ConvergenceRecord(_) => "convergence.record",
            EngineEvent::ArtifactWritten(_) => "artifact.written",
            EngineEvent::WarningRaised(_) => "warning.raised",
        }
    }
}

/// A dispatched event, stamped by the bus with a monotonic sequence
/// number and emission timestamp (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    pub event: EngineEvent,
}
