//! The deterministic trial plan: a pure function of `(resolved_config, seed)`.

use serde::{Deserialize, Serialize};

use crate::config::ProtocolKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedConfig {
    pub model: String,
    pub persona_id: String,
    pub protocol_id: String,
    pub decode: DecodeParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignments {
    pub proposer: String,
    pub critic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialPlanEntry {
    pub trial_id: u32,
    pub protocol: ProtocolKind,
    pub assigned_config: AssignedConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_assignments: Option<RoleAssignments>,
}

/// The full ordered plan plus its content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialPlan {
    pub entries: Vec<TrialPlanEntry>,
    pub plan_sha256: String,
}

impl TrialPlan {
    pub fn k_planned(&self) -> u32 {
        self.entries.len() as u32
    }
}
