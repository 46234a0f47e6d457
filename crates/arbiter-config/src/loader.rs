//! Loads and resolves a run configuration: `defaults < file < env < cli`,
//! then validates the merged value against the resolved-config schema and
//! deserializes it into `arbiter_types::config::ResolvedConfig`.

use std::path::Path;

use arbiter_types::config::ResolvedConfig;
use serde_json::Value;

use crate::defaults::defaults_layer;
use crate::env::env_layer;
use crate::error::ConfigError;
use crate::layers::{deep_merge, merge_all};
use crate::schema::resolved_config_schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Unknown top-level keys are a validation error.
    Strict,
    /// Unknown top-level keys are tolerated (and logged at the call site).
    Permissive,
}

/// Reads a JSON or YAML config file from disk into a `Value`, without
/// resolving or validating it yet.
pub fn read_file_layer(path: &Path) -> Result<Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "json" => serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            format: "json",
            source: e.into(),
        }),
        "yaml" | "yml" => serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            format: "yaml",
            source: e.into(),
        }),
        other => Err(ConfigError::UnsupportedExtension(other.to_string())),
    }
}

/// Fills in `run.run_id`/`run.seed` when absent from every layer, so a
/// config file can omit them entirely and still resolve to a fully
/// determined (if freshly randomized) run identity.
fn ensure_run_identity(merged: &mut Value) {
    let run = merged
        .as_object_mut()
        .expect("merged config root is always an object")
        .entry("run")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));

    let run_obj = run.as_object_mut().expect("run layer is always an object");

    if !run_obj.contains_key("run_id") || run_obj["run_id"].is_null() {
        run_obj.insert(
            "run_id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    if !run_obj.contains_key("seed") || run_obj["seed"].is_null() {
        run_obj.insert("seed".to_string(), Value::from(random_seed()));
    }
}

fn random_seed() -> u64 {
    let bytes = uuid::Uuid::new_v4();
    let slice = bytes.as_bytes();
    u64::from_le_bytes(slice[0..8].try_into().expect("16-byte uuid has 8 leading bytes"))
}

fn strict_schema(base: Value) -> Value {
    let mut schema = base;
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    schema
}

pub fn validate(merged: &Value, strictness: Strictness) -> Result<(), ConfigError> {
    let schema = match strictness {
        Strictness::Strict => strict_schema(resolved_config_schema()),
        Strictness::Permissive => resolved_config_schema(),
    };
    let validator = jsonschema::validator_for(&schema)
        .expect("resolved_config_schema is a fixed, known-valid schema");

    let issues: Vec<String> = validator
        .iter_errors(merged)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation { issues })
    }
}

/// Loads, merges, validates, and deserializes a resolved config.
///
/// `cli_overrides` is the highest-precedence layer (typically built from
/// parsed CLI flags by the binary crate); pass `serde_json::Value::Null` or
/// an empty object when there are none.
pub fn load_config(
    path: &Path,
    cli_overrides: Value,
    strictness: Strictness,
) -> Result<ResolvedConfig, ConfigError> {
    let file = read_file_layer(path)?;
    let mut merged = merge_all(&[defaults_layer(), file, env_layer(), cli_overrides]);
    ensure_run_identity(&mut merged);

    validate(&merged, strictness)?;

    serde_json::from_value(merged.clone()).map_err(|e| ConfigError::Validation {
        issues: vec![format!("merged config does not match ResolvedConfig: {e}")],
    })
}

/// Re-validates and re-parses an already-resolved config's canonical JSON
/// form, used by `arbiter verify`/`arbiter resolve` to check a persisted
/// `config.resolved.json` without re-running the merge.
pub fn validate_resolved_value(value: &Value, strictness: Strictness) -> Result<(), ConfigError> {
    validate(value, strictness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn minimal_file_layer() -> Value {
        json!({
            "question_id": "q1",
            "question_text": "What is the capital of France?",
            "sampling": {
                "models": [{ "id": "model-a", "weight": 1.0 }],
                "personas": [{ "id": "neutral", "weight": 1.0 }],
                "protocols": [{ "id": "default", "weight": 1.0 }]
            },
            "protocol": { "kind": "independent" },
            "execution": {},
            "measurement": { "embedding_model": "text-embedding-test" }
        })
    }

    fn write_temp_json(value: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(serde_json::to_string(value).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[test]
    fn minimal_file_resolves_with_defaults_filled_in() {
        let file = write_temp_json(&minimal_file_layer());
        let resolved = load_config(file.path(), Value::Null, Strictness::Permissive).unwrap();
        assert_eq!(resolved.question_id, "q1");
        assert_eq!(resolved.execution.k_max, 20);
        assert!(!resolved.run.run_id.is_empty());
    }

    #[test]
    fn cli_override_wins_over_file() {
        let file = write_temp_json(&minimal_file_layer());
        let cli = json!({ "execution": { "k_max": 2 } });
        let resolved = load_config(file.path(), cli, Strictness::Permissive).unwrap();
        assert_eq!(resolved.execution.k_max, 2);
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let mut broken = minimal_file_layer();
        broken.as_object_mut().unwrap().remove("question_text");
        let file = write_temp_json(&broken);
        let result = load_config(file.path(), Value::Null, Strictness::Permissive);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn unknown_top_level_key_fails_only_in_strict_mode() {
        let mut with_extra = minimal_file_layer();
        with_extra
            .as_object_mut()
            .unwrap()
            .insert("unexpected_field".to_string(), json!(true));
        let file = write_temp_json(&with_extra);

        let permissive = load_config(file.path(), Value::Null, Strictness::Permissive);
        assert!(permissive.is_ok());

        let strict = load_config(file.path(), Value::Null, Strictness::Strict);
        assert!(strict.is_err());
    }

    #[test]
    fn two_loads_without_a_seed_override_produce_different_seeds() {
        let file_a = write_temp_json(&minimal_file_layer());
        let file_b = write_temp_json(&minimal_file_layer());
        let a = load_config(file_a.path(), Value::Null, Strictness::Permissive).unwrap();
        let b = load_config(file_b.path(), Value::Null, Strictness::Permissive).unwrap();
        assert_ne!(a.run.seed, b.run.seed);
    }
}
