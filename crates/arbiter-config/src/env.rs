//! The `env` layer: read a handful of well-known environment variables,
//! ignore anything absent or blank, and merge the rest into a small
//! `Value` overlay.

use serde_json::{json, Value};

use crate::layers::{deep_merge, empty_object};

pub fn env_layer() -> Value {
    let mut root = empty_object();

    if let Some(seed) = parse_env_u64("ARBITER_SEED") {
        deep_merge(&mut root, &json!({ "run": { "seed": seed } }));
    }
    if let Ok(run_id) = std::env::var("ARBITER_RUN_ID") {
        if !run_id.trim().is_empty() {
            deep_merge(&mut root, &json!({ "run": { "run_id": run_id } }));
        }
    }
    if let Some(k_max) = parse_env_u64("ARBITER_K_MAX") {
        deep_merge(&mut root, &json!({ "execution": { "k_max": k_max } }));
    }
    if let Some(batch_size) = parse_env_u64("ARBITER_BATCH_SIZE") {
        deep_merge(&mut root, &json!({ "execution": { "batch_size": batch_size } }));
    }
    if let Some(workers) = parse_env_u64("ARBITER_WORKERS") {
        deep_merge(&mut root, &json!({ "execution": { "workers": workers } }));
    }
    if let Ok(stop_mode) = std::env::var("ARBITER_STOP_MODE") {
        if !stop_mode.trim().is_empty() {
            deep_merge(&mut root, &json!({ "execution": { "stop_mode": stop_mode } }));
        }
    }
    if let Ok(embedding_model) = std::env::var("ARBITER_EMBEDDING_MODEL") {
        if !embedding_model.trim().is_empty() {
            deep_merge(
                &mut root,
                &json!({ "measurement": { "embedding_model": embedding_model } }),
            );
        }
    }

    root
}

fn parse_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_env_var_is_ignored() {
        std::env::set_var("ARBITER_RUN_ID", "   ");
        let layer = env_layer();
        std::env::remove_var("ARBITER_RUN_ID");
        assert!(layer.get("run").is_none());
    }

    #[test]
    fn numeric_env_var_is_parsed_into_its_place() {
        std::env::set_var("ARBITER_K_MAX", "42");
        let layer = env_layer();
        std::env::remove_var("ARBITER_K_MAX");
        assert_eq!(layer["execution"]["k_max"], 42);
    }
}
