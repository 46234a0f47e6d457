//! `embeddings.provenance.json`: the record of how `embeddings.arrow`
//! (or its absence) came to be.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationStatus {
    /// `embeddings.arrow` was written; it is the authoritative source.
    ArrowGenerated,
    /// Arrow generation failed or was impossible; `debug/embeddings.jsonl`
    /// remains the authoritative source regardless of `--debug`.
    JsonlFallback,
    /// No trial produced a successful embedding; there is nothing to
    /// finalize.
    NotGenerated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceCounts {
    pub total: u32,
    pub embedded: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsProvenance {
    pub status: FinalizationStatus,
    pub requested_embedding_model: String,
    pub generation_ids: Vec<String>,
    pub dimension: Option<u32>,
    pub counts: ProvenanceCounts,
    pub debug_jsonl_retained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
