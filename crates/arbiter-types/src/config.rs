//! The resolved run configuration: immutable once the (external) config
//! loader has validated and defaulted a user-supplied config file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedEntry {
    pub id: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Sampling {
    pub models: Vec<WeightedEntry>,
    pub personas: Vec<WeightedEntry>,
    pub protocols: Vec<WeightedEntry>,
    #[serde(default)]
    pub instruments: Vec<WeightedEntry>,
    #[serde(default)]
    pub decode: DecodeRanges,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecodeRanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Range>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Independent,
    DebateV1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerCallTimeouts {
    pub per_call_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContract {
    pub id: String,
    pub sha256: String,
    pub schema: serde_json::Value,
    pub embed_text_source: EmbedTextSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale_max_chars: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedTextSource {
    Decision,
    Rationale,
    RawContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub kind: ProtocolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_contract: Option<DecisionContract>,
    pub timeouts: PerCallTimeouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KMinCountRule {
    KEligible,
    KAttempted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    Advisor,
    Enforcer,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFailurePolicy {
    Warn,
    Exclude,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    #[serde(default)]
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 500,
            exponential: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopPolicy {
    pub novelty_epsilon: f64,
    pub similarity_threshold: f64,
    pub patience: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub k_max: u32,
    pub batch_size: u32,
    pub workers: u32,
    #[serde(default)]
    pub k_min: u32,
    pub k_min_count_rule: KMinCountRule,
    pub stop_mode: StopMode,
    pub stop_policy: StopPolicy,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub contract_failure_policy: ContractFailurePolicy,
}

impl Default for ContractFailurePolicy {
    fn default() -> Self {
        ContractFailurePolicy::Warn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedTextStrategy {
    OutcomeOnly,
    OutcomeOrRaw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentroidUpdateRule {
    FixedLeader,
    IncrementalMean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub enabled: bool,
    pub tau: f64,
    pub centroid_update_rule: CentroidUpdateRule,
    pub cluster_limit: u32,
    pub stop_mode: StopMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub embedding_model: String,
    pub embed_text_strategy: EmbedTextStrategy,
    pub embedding_max_chars: u32,
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub question_id: String,
    pub question_text: String,
    pub sampling: Sampling,
    pub protocol: ProtocolConfig,
    pub execution: Execution,
    pub measurement: Measurement,
    pub run: RunMeta,
}

impl ResolvedConfig {
    /// SHA-256 over the canonical-JSON encoding of the whole resolved config.
    pub fn content_sha256(&self) -> String {
        crate::hashing::sha256_of(self)
    }
}
