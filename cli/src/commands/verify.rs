//! `arbiter verify`: re-hashes every artifact listed in `manifest.json`
//! against the bytes actually on disk and reports any mismatch.

use anyhow::{bail, Context};
use arbiter_types::hashing::sha256_hex;
use arbiter_types::manifest::RunManifest;

use crate::VerifyArgs;

pub fn run(args: VerifyArgs) -> anyhow::Result<()> {
    let manifest_path = args.run_dir.join("manifest.json");
    let raw = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: RunManifest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

    let mut mismatches = Vec::new();
    let mut missing = Vec::new();

    for artifact in &manifest.artifacts {
        let Some(expected) = &artifact.sha256 else {
            continue;
        };
        let path = args.run_dir.join(&artifact.path);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let actual = sha256_hex(&bytes);
                if &actual != expected {
                    mismatches.push(artifact.path.clone());
                }
            }
            Err(_) => missing.push(artifact.path.clone()),
        }
    }

    if missing.is_empty() && mismatches.is_empty() {
        println!(
            "{} verified: {} artifacts match their recorded hashes",
            args.run_dir.display(),
            manifest.artifacts.iter().filter(|a| a.sha256.is_some()).count()
        );
        return Ok(());
    }

    for path in &missing {
        eprintln!("missing: {path}");
    }
    for path in &mismatches {
        eprintln!("hash mismatch: {path}");
    }
    bail!(
        "{} failed verification ({} missing, {} mismatched)",
        args.run_dir.display(),
        missing.len(),
        mismatches.len()
    )
}
