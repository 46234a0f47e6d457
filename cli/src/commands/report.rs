//! `arbiter report`: prints a summary of an existing run's `manifest.json`.

use anyhow::Context;
use arbiter_types::manifest::RunManifest;

use crate::ReportArgs;

pub fn run(args: ReportArgs) -> anyhow::Result<()> {
    let manifest_path = args.run_dir.join("manifest.json");
    let raw = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: RunManifest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

    println!("run_id:        {}", manifest.run_id);
    println!("stop_reason:   {:?}", manifest.stop_reason);
    println!("incomplete:    {}", manifest.incomplete);
    println!(
        "trials:        {} attempted / {} eligible / {} planned ({} batches)",
        manifest.counts.k_attempted,
        manifest.counts.k_eligible,
        manifest.counts.k_planned,
        manifest.counts.batches_run
    );
    println!(
        "contract:      policy={:?} fallback={} failed={}",
        manifest.contract_failure_policy.policy,
        manifest.contract_failure_policy.fallback_count,
        manifest.contract_failure_policy.failed_count
    );
    if !manifest.usage_totals.is_empty() {
        println!("usage by model:");
        for (model, usage) in &manifest.usage_totals {
            println!(
                "  {model}: prompt={} completion={} total={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
    }
    println!("artifacts:");
    for artifact in &manifest.artifacts {
        println!(
            "  {} ({}, {} bytes)",
            artifact.path,
            artifact.kind,
            artifact.bytes.unwrap_or(0)
        );
    }
    if !manifest.notes.is_empty() {
        println!("notes:");
        for note in &manifest.notes {
            println!("  - {note}");
        }
    }

    Ok(())
}
