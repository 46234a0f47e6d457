//! `arbiter init`: scaffolds a starter config file.

use anyhow::{bail, Context};

use crate::InitArgs;

const TEMPLATE: &str = r#"question_id: q1
question_text: "What is the capital of France?"
sampling:
  models:
    - id: openrouter/auto
      weight: 1.0
  personas:
    - id: neutral
      weight: 1.0
  protocols:
    - id: default
      weight: 1.0
protocol:
  kind: independent
execution:
  k_max: 20
  batch_size: 5
  workers: 4
measurement:
  embedding_model: text-embedding-3-small
"#;

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    if args.out.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.out.display()
        );
    }
    std::fs::write(&args.out, TEMPLATE)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("wrote starter config to {}", args.out.display());
    Ok(())
}
