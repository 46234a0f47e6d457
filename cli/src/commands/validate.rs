//! `arbiter validate`: merges the config layers (defaults/file/env) and
//! validates+resolves the result without running anything.

use anyhow::bail;
use arbiter_config::loader::Strictness;
use serde_json::Value;

use crate::ValidateArgs;

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let strictness = if args.strict {
        Strictness::Strict
    } else {
        Strictness::Permissive
    };

    match arbiter_config::load_config(&args.config, Value::Null, strictness) {
        Ok(resolved) => {
            println!(
                "{} is valid ({} models, {} personas, k_max={})",
                args.config.display(),
                resolved.sampling.models.len(),
                resolved.sampling.personas.len(),
                resolved.execution.k_max
            );
            Ok(())
        }
        Err(err) => bail!("{} failed validation: {err}", args.config.display()),
    }
}
