//! Renders the plain-text `receipt.txt` artifact from a run's manifest (and,
//! when present, its embedding provenance record). This is a terse summary
//! for a human skimming a run directory, not the full audit view.

use std::fmt::Write as _;

use arbiter_finalizer::EmbeddingsProvenance;
use arbiter_types::manifest::RunManifest;

pub fn render(manifest: &RunManifest, provenance: Option<&EmbeddingsProvenance>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Arbiter run receipt");
    let _ = writeln!(out, "===================");
    let _ = writeln!(out, "run_id:      {}", manifest.run_id);
    let _ = writeln!(out, "started_at:  {}", manifest.started_at.to_rfc3339());
    if let Some(completed_at) = manifest.completed_at {
        let _ = writeln!(out, "completed_at: {}", completed_at.to_rfc3339());
    }
    let _ = writeln!(out, "stop_reason: {:?}", manifest.stop_reason);
    let _ = writeln!(out, "incomplete:  {}", manifest.incomplete);
    let _ = writeln!(
        out,
        "trials:      {} attempted / {} eligible / {} planned across {} batches",
        manifest.counts.k_attempted,
        manifest.counts.k_eligible,
        manifest.counts.k_planned,
        manifest.counts.batches_run
    );
    let _ = writeln!(
        out,
        "contract:    policy={:?} fallback={} failed={}",
        manifest.contract_failure_policy.policy,
        manifest.contract_failure_policy.fallback_count,
        manifest.contract_failure_policy.failed_count
    );
    let _ = writeln!(out, "config sha256: {}", manifest.content_hashes.config_sha256);
    let _ = writeln!(out, "plan sha256:   {}", manifest.content_hashes.plan_sha256);

    if let Some(provenance) = provenance {
        let _ = writeln!(out);
        let _ = writeln!(out, "embeddings:  {:?}", provenance.status);
        let _ = writeln!(
            out,
            "  requested model: {}",
            provenance.requested_embedding_model
        );
        let _ = writeln!(
            out,
            "  embedded={} skipped={} failed={} of {}",
            provenance.counts.embedded,
            provenance.counts.skipped,
            provenance.counts.failed,
            provenance.counts.total
        );
        if let Some(dimension) = provenance.dimension {
            let _ = writeln!(out, "  dimension: {dimension}");
        }
        if let Some(error) = &provenance.error {
            let _ = writeln!(out, "  error: {error}");
        }
    }

    if !manifest.usage_totals.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "usage by model:");
        for (model, usage) in &manifest.usage_totals {
            let _ = writeln!(
                out,
                "  {model}: prompt={} completion={} total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
    }

    if !manifest.notes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "notes:");
        for note in &manifest.notes {
            let _ = writeln!(out, "  - {note}");
        }
    }

    out
}
