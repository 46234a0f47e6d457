//! The run directory's fixed artifact layout.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trial_plan_jsonl(&self) -> PathBuf {
        self.root.join("trial_plan.jsonl")
    }

    pub fn trials_jsonl(&self) -> PathBuf {
        self.root.join("trials.jsonl")
    }

    pub fn monitoring_jsonl(&self) -> PathBuf {
        self.root.join("monitoring.jsonl")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.root.join("debug")
    }

    pub fn debug_embeddings_jsonl(&self) -> PathBuf {
        self.debug_dir().join("embeddings.jsonl")
    }

    pub fn groups_dir(&self) -> PathBuf {
        self.root.join("groups")
    }

    pub fn groups_assignments_jsonl(&self) -> PathBuf {
        self.groups_dir().join("assignments.jsonl")
    }

    pub fn groups_state_json(&self) -> PathBuf {
        self.groups_dir().join("state.json")
    }

    pub fn config_source_json(&self) -> PathBuf {
        self.root.join("config.source.json")
    }

    pub fn config_resolved_json(&self) -> PathBuf {
        self.root.join("config.resolved.json")
    }

    pub fn manifest_json(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn embeddings_arrow(&self) -> PathBuf {
        self.root.join("embeddings.arrow")
    }

    pub fn embeddings_provenance_json(&self) -> PathBuf {
        self.root.join("embeddings.provenance.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
