//! The `defaults` layer: the bottom of the merge stack, filled in with the
//! same values `arbiter-types`' own `Default` impls carry where one exists,
//! plus the handful of fields that have no `Default` impl because they are
//! mandatory in the type but have a sane engine-wide default at the config
//! layer (e.g. `workers`, `stop_mode`).

use serde_json::json;

pub fn defaults_layer() -> serde_json::Value {
    json!({
        "sampling": {
            "instruments": [],
            "decode": {}
        },
        "protocol": {
            "timeouts": { "per_call_timeout_ms": 60_000 }
        },
        "execution": {
            "k_max": 20,
            "batch_size": 5,
            "workers": 4,
            "k_min": 0,
            "k_min_count_rule": "k_eligible",
            "stop_mode": "advisor",
            "stop_policy": {
                "novelty_epsilon": 0.02,
                "similarity_threshold": 0.85,
                "patience": 2
            },
            "retry_policy": {
                "max_retries": 3,
                "backoff_ms": 500,
                "exponential": true
            },
            "contract_failure_policy": "warn"
        },
        "measurement": {
            "embedding_max_chars": 4000,
            "embed_text_strategy": "outcome_only",
            "clustering": {
                "enabled": true,
                "tau": 0.85,
                "centroid_update_rule": "incremental_mean",
                "cluster_limit": 32,
                "stop_mode": "advisor"
            }
        }
    })
}
