//! Assembles and writes the run's `manifest.json` (§4.10).
//!
//! `ArtifactWriter` has no manifest-building method of its own — it exposes
//! the running totals (`counts`, `usage_totals`, `contract_failure_snapshot`)
//! and a static `describe_artifact` helper, and this module is the one place
//! that reads them back to assemble a `RunManifest`, the same split the
//! writer's own doc comment draws between event-driven artifacts and
//! lifecycle-point "authoritative" ones.

use chrono::{DateTime, Utc};

use arbiter_types::config::{ContractFailurePolicy, StopPolicy};
use arbiter_types::manifest::{ArtifactEntry, ContentHashes, RunManifest, StopReason};
use arbiter_writer::{ArtifactWriter, WriterError};

pub const SCHEMA_VERSION: &str = "1";
pub const ARBITER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct ManifestInputs<'a> {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stop_reason: StopReason,
    pub incomplete: bool,
    pub config_sha256: String,
    pub plan_sha256: String,
    pub stop_policy: StopPolicy,
    pub contract_failure_policy: ContractFailurePolicy,
    pub notes: Vec<String>,
    pub writer: &'a ArtifactWriter,
}

/// Describes every artifact the writer may have produced, omitting any that
/// don't exist on disk (e.g. `groups/*` when clustering was disabled,
/// `embeddings.arrow`/`embeddings.provenance.json` before finalization ran).
fn describe_known_artifacts(writer: &ArtifactWriter) -> Vec<ArtifactEntry> {
    let paths = writer.paths();
    let candidates: &[(std::path::PathBuf, &str)] = &[
        (paths.config_source_json(), "config_source"),
        (paths.config_resolved_json(), "config_resolved"),
        (paths.trial_plan_jsonl(), "trial_plan"),
        (paths.trials_jsonl(), "trials"),
        (paths.monitoring_jsonl(), "monitoring"),
        (paths.debug_embeddings_jsonl(), "debug_embeddings"),
        (paths.groups_assignments_jsonl(), "groups_assignments"),
        (paths.groups_state_json(), "groups_state"),
        (paths.embeddings_arrow(), "embeddings_arrow"),
        (paths.embeddings_provenance_json(), "embeddings_provenance"),
    ];
    candidates
        .iter()
        .filter_map(|(path, kind)| ArtifactWriter::describe_artifact(path, kind))
        .collect()
}

pub fn build_and_write(inputs: ManifestInputs<'_>) -> Result<RunManifest, WriterError> {
    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION.to_string(),
        arbiter_version: ARBITER_VERSION.to_string(),
        run_id: inputs.run_id,
        started_at: inputs.started_at,
        completed_at: inputs.completed_at,
        stop_reason: inputs.stop_reason,
        incomplete: inputs.incomplete,
        counts: inputs.writer.counts(),
        stop_policy: inputs.stop_policy,
        content_hashes: ContentHashes {
            config_sha256: inputs.config_sha256,
            plan_sha256: inputs.plan_sha256,
            catalog_sha256: None,
            prompt_manifest_sha256: None,
        },
        artifacts: describe_known_artifacts(inputs.writer),
        usage_totals: inputs.writer.usage_totals(),
        contract_failure_policy: inputs.writer.contract_failure_snapshot(inputs.contract_failure_policy),
        notes: inputs.notes,
    };

    arbiter_writer::write_json_atomic(&inputs.writer.paths().manifest_json(), &manifest)?;
    Ok(manifest)
}
