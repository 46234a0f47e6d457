//! Online leader clustering over embedding vectors (§4.6).
//!
//! Each batch's trials are processed in ascending `trial_id` order so the
//! result never depends on completion order, only on the plan. A trial
//! joins the nearest existing cluster if its cosine similarity to that
//! cluster's centroid reaches `tau`; otherwise it opens a new cluster
//! (becoming its exemplar) unless `cluster_limit` clusters already exist, in
//! which case it is force-assigned to the nearest cluster regardless of
//! `tau`.

use arbiter_types::cluster::{ClusterAssignment, ClusterInfo, ClusterParams, ClusterStateSnapshot, ClusterTotals};
use arbiter_types::config::CentroidUpdateRule;
use arbiter_types::embedding::EmbeddingRecord;

/// Cosine similarity between two equal-length vectors; zero vectors are
/// defined to have zero similarity rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "embedding dimensions must match");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

struct Cluster {
    cluster_id: u32,
    exemplar_trial_id: u32,
    centroid: Vec<f32>,
    member_count: u32,
    discovered_at_batch: u32,
}

pub struct Clusterer {
    tau: f64,
    centroid_update_rule: CentroidUpdateRule,
    cluster_limit: u32,
    clusters: Vec<Cluster>,
    totals: ClusterTotals,
    next_cluster_id: u32,
}

/// One embedded trial ready for assignment.
pub struct ClusterInput {
    pub trial_id: u32,
    pub vector: Vec<f32>,
}

impl Clusterer {
    pub fn new(tau: f64, centroid_update_rule: CentroidUpdateRule, cluster_limit: u32) -> Self {
        Self {
            tau,
            centroid_update_rule,
            cluster_limit,
            clusters: Vec::new(),
            totals: ClusterTotals::default(),
            next_cluster_id: 0,
        }
    }

    /// Assigns a batch of embedded trials, mutating cluster state and
    /// returning one `ClusterAssignment` per input, in the order processed
    /// (ascending `trial_id`, irrespective of input order).
    pub fn assign_batch(&mut self, batch_number: u32, mut items: Vec<ClusterInput>) -> Vec<ClusterAssignment> {
        items.sort_by_key(|i| i.trial_id);

        let mut assignments = Vec::with_capacity(items.len());
        for item in items {
            assignments.push(self.assign_one(batch_number, item));
        }
        assignments
    }

    fn best_match(&self, vector: &[f32]) -> Option<(usize, f32)> {
        self.clusters
            .iter()
            .enumerate()
            .map(|(idx, cluster)| (idx, cosine_similarity(vector, &cluster.centroid)))
            .fold(None, |best: Option<(usize, f32)>, (idx, sim)| match best {
                Some((best_idx, best_sim)) if sim <= best_sim => Some((best_idx, best_sim)),
                _ => Some((idx, sim)),
            })
    }

    fn assign_one(&mut self, batch_number: u32, item: ClusterInput) -> ClusterAssignment {
        self.totals.total_assigned += 1;

        let best = self.best_match(&item.vector);

        let over_threshold = best
            .map(|(_, sim)| (sim as f64) >= self.tau)
            .unwrap_or(false);

        if over_threshold {
            let (idx, sim) = best.expect("over_threshold implies best match exists");
            self.update_member(idx, &item.vector);
            let cluster_id = self.clusters[idx].cluster_id;
            return ClusterAssignment {
                trial_id: item.trial_id,
                cluster_id,
                similarity: sim,
                is_exemplar: false,
                forced: false,
                batch_number,
            };
        }

        if self.clusters.len() < self.cluster_limit as usize {
            let cluster_id = self.next_cluster_id;
            self.next_cluster_id += 1;
            self.clusters.push(Cluster {
                cluster_id,
                exemplar_trial_id: item.trial_id,
                centroid: item.vector,
                member_count: 1,
                discovered_at_batch: batch_number,
            });
            return ClusterAssignment {
                trial_id: item.trial_id,
                cluster_id,
                similarity: best.map(|(_, sim)| sim).unwrap_or(0.0),
                is_exemplar: true,
                forced: false,
                batch_number,
            };
        }

        // Cluster limit reached: force-assign to the nearest cluster even
        // though it falls short of `tau`.
        let (idx, sim) = best.expect("cluster_limit > 0 implies at least one cluster exists");
        self.update_member(idx, &item.vector);
        self.totals.forced_assignments += 1;
        let cluster_id = self.clusters[idx].cluster_id;
        ClusterAssignment {
            trial_id: item.trial_id,
            cluster_id,
            similarity: sim,
            is_exemplar: false,
            forced: true,
            batch_number,
        }
    }

    fn update_member(&mut self, idx: usize, vector: &[f32]) {
        let cluster = &mut self.clusters[idx];
        match self.centroid_update_rule {
            CentroidUpdateRule::FixedLeader => {}
            CentroidUpdateRule::IncrementalMean => {
                let n = cluster.member_count as f32;
                for (c, v) in cluster.centroid.iter_mut().zip(vector.iter()) {
                    *c = (*c * n + v) / (n + 1.0);
                }
            }
        }
        cluster.member_count += 1;
    }

    /// Records trials from this batch that never reached clustering because
    /// their embedding was skipped or failed.
    pub fn record_excluded(&mut self, count: u32) {
        self.totals.total_excluded += count;
    }

    /// The counts of members per cluster, in cluster-id order; used by the
    /// novelty monitor's Jensen-Shannon divergence input.
    pub fn member_distribution(&self) -> Vec<u32> {
        self.clusters.iter().map(|c| c.member_count).collect()
    }

    pub fn cluster_count(&self) -> u32 {
        self.clusters.len() as u32
    }

    pub fn snapshot(&self) -> ClusterStateSnapshot {
        ClusterStateSnapshot {
            algorithm: "online_leader_clustering".to_string(),
            params: ClusterParams {
                tau: self.tau,
                centroid_update_rule: self.centroid_update_rule,
                ordering_rule: "ascending_trial_id".to_string(),
                cluster_limit: self.cluster_limit,
            },
            clusters: self
                .clusters
                .iter()
                .map(|c| ClusterInfo {
                    cluster_id: c.cluster_id,
                    exemplar_trial_id: c.exemplar_trial_id,
                    member_count: c.member_count,
                    discovered_at_batch: c.discovered_at_batch,
                    centroid_vector_b64: EmbeddingRecord::encode_vector(&c.centroid),
                })
                .collect(),
            totals: self.totals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(trial_id: u32, vector: Vec<f32>) -> ClusterInput {
        ClusterInput { trial_id, vector }
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn first_item_always_opens_a_cluster() {
        let mut clusterer = Clusterer::new(0.8, CentroidUpdateRule::FixedLeader, 10);
        let assignments = clusterer.assign_batch(0, vec![input(0, vec![1.0, 0.0])]);
        assert!(assignments[0].is_exemplar);
        assert_eq!(clusterer.cluster_count(), 1);
    }

    #[test]
    fn near_duplicate_joins_existing_cluster() {
        let mut clusterer = Clusterer::new(0.95, CentroidUpdateRule::FixedLeader, 10);
        clusterer.assign_batch(0, vec![input(0, vec![1.0, 0.0])]);
        let assignments = clusterer.assign_batch(1, vec![input(1, vec![0.999, 0.001])]);
        assert!(!assignments[0].is_exemplar);
        assert_eq!(clusterer.cluster_count(), 1);
    }

    #[test]
    fn distant_vector_opens_a_new_cluster() {
        let mut clusterer = Clusterer::new(0.95, CentroidUpdateRule::FixedLeader, 10);
        clusterer.assign_batch(0, vec![input(0, vec![1.0, 0.0])]);
        let assignments = clusterer.assign_batch(1, vec![input(1, vec![0.0, 1.0])]);
        assert!(assignments[0].is_exemplar);
        assert_eq!(clusterer.cluster_count(), 2);
    }

    #[test]
    fn cluster_limit_forces_assignment_instead_of_opening_a_new_cluster() {
        let mut clusterer = Clusterer::new(0.95, CentroidUpdateRule::FixedLeader, 1);
        clusterer.assign_batch(0, vec![input(0, vec![1.0, 0.0])]);
        let assignments = clusterer.assign_batch(1, vec![input(1, vec![0.0, 1.0])]);
        assert!(!assignments[0].is_exemplar);
        assert!(assignments[0].forced);
        assert_eq!(clusterer.cluster_count(), 1);
    }

    #[test]
    fn batch_is_processed_in_ascending_trial_id_order_regardless_of_input_order() {
        let mut clusterer = Clusterer::new(0.99, CentroidUpdateRule::IncrementalMean, 10);
        let assignments = clusterer.assign_batch(
            0,
            vec![input(5, vec![0.0, 1.0]), input(2, vec![1.0, 0.0])],
        );
        assert_eq!(assignments[0].trial_id, 2);
        assert_eq!(assignments[1].trial_id, 5);
    }

    #[test]
    fn record_excluded_accumulates_into_snapshot_totals() {
        let mut clusterer = Clusterer::new(0.8, CentroidUpdateRule::FixedLeader, 10);
        clusterer.assign_batch(0, vec![input(0, vec![1.0, 0.0])]);
        clusterer.record_excluded(2);
        clusterer.record_excluded(1);
        assert_eq!(clusterer.snapshot().totals.total_excluded, 3);
    }

    #[test]
    fn incremental_mean_moves_centroid_toward_new_members() {
        let mut clusterer = Clusterer::new(0.5, CentroidUpdateRule::IncrementalMean, 10);
        clusterer.assign_batch(0, vec![input(0, vec![1.0, 0.0])]);
        clusterer.assign_batch(1, vec![input(1, vec![0.0, 1.0])]);
        let snapshot = clusterer.snapshot();
        let centroid = EmbeddingRecord::decode_vector(&snapshot.clusters[0].centroid_vector_b64).unwrap();
        assert!((centroid[0] - 0.5).abs() < 1e-6);
        assert!((centroid[1] - 0.5).abs() < 1e-6);
    }
}
