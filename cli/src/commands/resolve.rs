//! `arbiter resolve`: loads, merges, and prints a fully resolved config as
//! JSON, without running anything.

use anyhow::Context;
use arbiter_config::loader::Strictness;
use serde_json::Value;

use crate::ResolveArgs;

pub fn run(args: ResolveArgs) -> anyhow::Result<()> {
    let strictness = if args.strict {
        Strictness::Strict
    } else {
        Strictness::Permissive
    };

    let resolved = arbiter_config::load_config(&args.config, Value::Null, strictness)
        .with_context(|| format!("resolving {}", args.config.display()))?;

    let printed = serde_json::to_string_pretty(&resolved)?;
    println!("{printed}");
    Ok(())
}
