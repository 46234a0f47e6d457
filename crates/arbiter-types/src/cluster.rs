//! Online leader clustering: assignments and the persisted cluster state.

use serde::{Deserialize, Serialize};

use crate::config::CentroidUpdateRule;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub trial_id: u32,
    pub cluster_id: u32,
    pub similarity: f32,
    pub is_exemplar: bool,
    pub forced: bool,
    pub batch_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterParams {
    pub tau: f64,
    pub centroid_update_rule: CentroidUpdateRule,
    pub ordering_rule: String,
    pub cluster_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: u32,
    pub exemplar_trial_id: u32,
    pub member_count: u32,
    pub discovered_at_batch: u32,
    pub centroid_vector_b64: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterTotals {
    pub total_assigned: u32,
    pub total_excluded: u32,
    pub forced_assignments: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStateSnapshot {
    pub algorithm: String,
    pub params: ClusterParams,
    pub clusters: Vec<ClusterInfo>,
    pub totals: ClusterTotals,
}
