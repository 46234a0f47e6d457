//! The run manifest: the final, authoritative summary written once, atomically.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ContractFailurePolicy, StopPolicy};
use crate::trial::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    Converged,
    KMaxReached,
    UserInterrupt,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentHashes {
    pub config_sha256: String,
    pub plan_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_manifest_sha256: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub k_planned: u32,
    pub k_attempted: u32,
    pub k_eligible: u32,
    pub batches_run: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractFailurePolicySnapshot {
    pub policy: ContractFailurePolicy,
    pub fallback_count: u32,
    pub failed_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: String,
    pub arbiter_version: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub stop_reason: StopReason,
    pub incomplete: bool,
    pub counts: RunCounts,
    pub stop_policy: StopPolicy,
    pub content_hashes: ContentHashes,
    pub artifacts: Vec<ArtifactEntry>,
    pub usage_totals: HashMap<String, Usage>,
    pub contract_failure_policy: ContractFailurePolicySnapshot,
    #[serde(default)]
    pub notes: Vec<String>,
}
