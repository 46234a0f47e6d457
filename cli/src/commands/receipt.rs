//! `arbiter receipt`: re-renders `receipt.txt` from an existing run's
//! `manifest.json` (and `embeddings.provenance.json`, if present).

use anyhow::Context;
use arbiter_finalizer::EmbeddingsProvenance;
use arbiter_types::manifest::RunManifest;

use crate::receipt::render;
use crate::ReceiptArgs;

pub fn run(args: ReceiptArgs) -> anyhow::Result<()> {
    let manifest_path = args.run_dir.join("manifest.json");
    let raw = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: RunManifest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

    let provenance_path = args.run_dir.join("embeddings.provenance.json");
    let provenance = match std::fs::read_to_string(&provenance_path) {
        Ok(raw) => Some(
            serde_json::from_str::<EmbeddingsProvenance>(&raw)
                .with_context(|| format!("failed to parse {}", provenance_path.display()))?,
        ),
        Err(_) => None,
    };

    let rendered = render(&manifest, provenance.as_ref());
    let receipt_path = args.run_dir.join("receipt.txt");
    std::fs::write(&receipt_path, &rendered)
        .with_context(|| format!("failed to write {}", receipt_path.display()))?;
    print!("{rendered}");
    Ok(())
}
