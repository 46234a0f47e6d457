//! Per-batch convergence monitoring records.

use serde::{Deserialize, Serialize};

use crate::config::StopMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopStatus {
    pub mode: StopMode,
    pub would_stop: bool,
    pub should_stop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceTraceRecord {
    pub batch_number: u32,
    pub k_attempted: u32,
    pub k_eligible: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_max_sim_to_prior: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_distribution: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js_divergence: Option<f64>,
    pub low_novelty_streak: u32,
    pub stop: StopStatus,
}
