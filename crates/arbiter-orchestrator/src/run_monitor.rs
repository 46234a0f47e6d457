//! Drives the online clustering and novelty monitor after each batch
//! (§4.6, §4.7).
//!
//! Not an `EventBus` subscriber: publishing `cluster.assigned` and
//! `convergence.record` from inside a handler would require the handler to
//! hold a `'static` reference back to the bus, which a stack-owned,
//! non-`Arc`'d bus can't offer (see `arbiter_core::bus`'s doc comment). The
//! orchestrator instead calls `on_batch_completed` directly, right after
//! publishing the batch's `trial.completed`/`embedding.recorded` events.

use arbiter_core::EventBus;
use arbiter_monitor::clustering::{ClusterInput, Clusterer};
use arbiter_monitor::novelty::{reduce, BatchNoveltyInput, NoveltyState};
use arbiter_types::cluster::ClusterAssignment;
use arbiter_types::config::{CentroidUpdateRule, KMinCountRule, StopMode, StopPolicy};
use arbiter_types::convergence::ConvergenceTraceRecord;
use arbiter_types::events::EngineEvent;

use crate::error::OrchestratorError;

/// One trial whose embedding succeeded and is eligible for cluster
/// assignment this batch.
pub struct EligibleEmbedding {
    pub trial_id: u32,
    pub vector: Vec<f32>,
}

pub struct RunMonitor {
    clusterer: Option<Clusterer>,
    novelty_state: NoveltyState,
    stop_mode: StopMode,
    stop_policy: StopPolicy,
    k_min: u32,
    k_min_count_rule: KMinCountRule,
    prior_distribution: Option<Vec<u32>>,
    dimension: Option<u32>,
    should_stop: bool,
    cumulative_k_attempted: u32,
    cumulative_k_eligible: u32,
}

impl RunMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clustering_enabled: bool,
        tau: f64,
        centroid_update_rule: CentroidUpdateRule,
        cluster_limit: u32,
        stop_mode: StopMode,
        stop_policy: StopPolicy,
        k_min: u32,
        k_min_count_rule: KMinCountRule,
    ) -> Self {
        Self {
            clusterer: if clustering_enabled {
                Some(Clusterer::new(tau, centroid_update_rule, cluster_limit))
            } else {
                None
            },
            novelty_state: NoveltyState::default(),
            stop_mode,
            stop_policy,
            k_min,
            k_min_count_rule,
            prior_distribution: None,
            dimension: None,
            should_stop: false,
            cumulative_k_attempted: 0,
            cumulative_k_eligible: 0,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop
    }

    /// Validates embedding dimensions, assigns clusters, reduces novelty, and
    /// publishes `cluster.assigned` (one per item), then `clusters.state`,
    /// then a single `convergence.record` — in that order, satisfying
    /// "`cluster.assigned` precedes `convergence.record`".
    pub fn on_batch_completed(
        &mut self,
        bus: &EventBus,
        batch_number: u32,
        batch_k_attempted: u32,
        embeddings: &[EligibleEmbedding],
    ) -> Result<ConvergenceTraceRecord, OrchestratorError> {
        self.cumulative_k_attempted += batch_k_attempted;
        self.cumulative_k_eligible += embeddings.len() as u32;

        if let Some(clusterer) = &mut self.clusterer {
            let excluded = batch_k_attempted.saturating_sub(embeddings.len() as u32);
            clusterer.record_excluded(excluded);
        }

        for item in embeddings {
            let dims = item.vector.len() as u32;
            match self.dimension {
                None => self.dimension = Some(dims),
                Some(expected) if expected != dims => {
                    return Err(OrchestratorError::DimensionMismatch {
                        trial_id: item.trial_id,
                        expected,
                        got: dims,
                    });
                }
                _ => {}
            }
        }

        let assignments: Vec<ClusterAssignment> = match &mut self.clusterer {
            Some(clusterer) => {
                let inputs = embeddings
                    .iter()
                    .map(|e| ClusterInput {
                        trial_id: e.trial_id,
                        vector: e.vector.clone(),
                    })
                    .collect();
                clusterer.assign_batch(batch_number, inputs)
            }
            None => Vec::new(),
        };

        for assignment in &assignments {
            bus.publish(EngineEvent::ClusterAssigned(assignment.clone()));
        }

        if let Some(clusterer) = &self.clusterer {
            bus.publish(EngineEvent::ClustersState(clusterer.snapshot()));
        }

        let batch_eligible = embeddings.len() as u32;
        let (novelty_rate, mean_max_sim_to_prior, cluster_count, cluster_distribution) =
            if self.clusterer.is_some() && batch_eligible > 0 {
                let new_clusters_in_batch = assignments.iter().filter(|a| a.is_exemplar).count() as u32;
                let novelty_rate = new_clusters_in_batch as f64 / batch_eligible as f64;
                let non_exemplar_sims: Vec<f64> = assignments
                    .iter()
                    .filter(|a| !a.is_exemplar)
                    .map(|a| a.similarity as f64)
                    .collect();
                let mean_max_sim_to_prior = if non_exemplar_sims.is_empty() {
                    None
                } else {
                    Some(non_exemplar_sims.iter().sum::<f64>() / non_exemplar_sims.len() as f64)
                };
                let clusterer = self.clusterer.as_ref().expect("checked Some above");
                (
                    Some(novelty_rate),
                    mean_max_sim_to_prior,
                    Some(clusterer.cluster_count()),
                    Some(clusterer.member_distribution()),
                )
            } else {
                (None, None, None, None)
            };

        let k_for_min = match self.k_min_count_rule {
            KMinCountRule::KEligible => self.cumulative_k_eligible,
            KMinCountRule::KAttempted => self.cumulative_k_attempted,
        };
        let meets_k_min = k_for_min >= self.k_min;

        let input = BatchNoveltyInput {
            batch_number,
            k_attempted: self.cumulative_k_attempted,
            k_eligible: self.cumulative_k_eligible,
            novelty_rate: if meets_k_min { novelty_rate } else { None },
            mean_max_sim_to_prior: if meets_k_min { mean_max_sim_to_prior } else { None },
            cluster_count,
            cluster_distribution: cluster_distribution.clone(),
            prior_distribution: self.prior_distribution.clone(),
        };

        let (next_state, mut record) = reduce(self.novelty_state, input, &self.stop_policy, self.stop_mode);
        // `reduce` only sees the gated values; restore the measured values so
        // the persisted trace still shows what was actually computed.
        record.novelty_rate = novelty_rate;
        record.mean_max_sim_to_prior = mean_max_sim_to_prior;

        self.novelty_state = next_state;
        self.prior_distribution = cluster_distribution;
        self.should_stop = record.stop.should_stop;

        bus.publish(EngineEvent::ConvergenceRecord(record.clone()));
        Ok(record)
    }
}
