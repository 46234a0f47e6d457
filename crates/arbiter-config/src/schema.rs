//! The resolved-config JSON Schema, validated the same way
//! `arbiter_executor::contract::CompiledContract` validates a decision
//! contract: compile once with `jsonschema::validator_for`, then
//! `iter_errors` over the merged config value.

use serde_json::{json, Value};

pub fn resolved_config_schema() -> Value {
    json!({
        "type": "object",
        "required": ["question_id", "question_text", "sampling", "protocol", "execution", "measurement", "run"],
        "properties": {
            "question_id": { "type": "string", "minLength": 1 },
            "question_text": { "type": "string", "minLength": 1 },
            "sampling": {
                "type": "object",
                "required": ["models", "personas", "protocols"],
                "properties": {
                    "models": { "type": "array", "minItems": 1, "items": weighted_entry_schema() },
                    "personas": { "type": "array", "minItems": 1, "items": weighted_entry_schema() },
                    "protocols": { "type": "array", "minItems": 1, "items": weighted_entry_schema() },
                    "instruments": { "type": "array", "items": weighted_entry_schema() },
                    "decode": { "type": "object" }
                }
            },
            "protocol": {
                "type": "object",
                "required": ["kind", "timeouts"],
                "properties": {
                    "kind": { "enum": ["independent", "debate_v1"] },
                    "timeouts": {
                        "type": "object",
                        "required": ["per_call_timeout_ms"],
                        "properties": {
                            "per_call_timeout_ms": { "type": "integer", "minimum": 1 }
                        }
                    }
                }
            },
            "execution": {
                "type": "object",
                "required": ["k_max", "batch_size", "workers", "k_min_count_rule", "stop_mode", "stop_policy"],
                "properties": {
                    "k_max": { "type": "integer", "minimum": 1 },
                    "batch_size": { "type": "integer", "minimum": 1 },
                    "workers": { "type": "integer", "minimum": 1 },
                    "k_min": { "type": "integer", "minimum": 0 },
                    "k_min_count_rule": { "enum": ["k_eligible", "k_attempted"] },
                    "stop_mode": { "enum": ["advisor", "enforcer", "disabled"] },
                    "stop_policy": {
                        "type": "object",
                        "required": ["novelty_epsilon", "similarity_threshold", "patience"],
                        "properties": {
                            "novelty_epsilon": { "type": "number", "minimum": 0.0 },
                            "similarity_threshold": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                            "patience": { "type": "integer", "minimum": 1 }
                        }
                    }
                }
            },
            "measurement": {
                "type": "object",
                "required": ["embedding_model", "embed_text_strategy", "embedding_max_chars", "clustering"],
                "properties": {
                    "embedding_model": { "type": "string", "minLength": 1 },
                    "embed_text_strategy": { "enum": ["outcome_only", "outcome_or_raw"] },
                    "embedding_max_chars": { "type": "integer", "minimum": 1 },
                    "clustering": {
                        "type": "object",
                        "required": ["enabled", "tau", "centroid_update_rule", "cluster_limit", "stop_mode"],
                        "properties": {
                            "enabled": { "type": "boolean" },
                            "tau": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                            "centroid_update_rule": { "enum": ["fixed_leader", "incremental_mean"] },
                            "cluster_limit": { "type": "integer", "minimum": 1 },
                            "stop_mode": { "enum": ["advisor", "enforcer", "disabled"] }
                        }
                    }
                }
            },
            "run": {
                "type": "object",
                "required": ["run_id", "seed"],
                "properties": {
                    "run_id": { "type": "string", "minLength": 1 },
                    "seed": { "type": "integer", "minimum": 0 }
                }
            }
        }
    })
}

fn weighted_entry_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "weight"],
        "properties": {
            "id": { "type": "string", "minLength": 1 },
            "weight": { "type": "number", "minimum": 0.0 }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_compiles() {
        let schema = resolved_config_schema();
        assert!(jsonschema::validator_for(&schema).is_ok());
    }
}
