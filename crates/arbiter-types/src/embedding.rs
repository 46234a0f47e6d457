//! Embedding records: the debug-JSONL form (with the base64-encoded
//! vector) and the lighter-weight outcome embedded in a trial record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ContractParseExcluded,
    EmptyEmbedText,
    TrialNotSuccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    None,
    MaxChars,
}

/// Metadata-only view of an embedding outcome, embedded inline in a
/// [`crate::trial::TrialRecord`]. The vector itself is never duplicated
/// here; it lives only in the debug JSONL / finalized columnar file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingOutcome {
    pub embedding_status: EmbeddingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_text_sha256: Option<String>,
    pub embed_text_truncated: bool,
    pub embed_text_original_chars: u32,
    pub embed_text_final_chars: u32,
    pub truncation_reason: TruncationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full embedding record as persisted to `debug/embeddings.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub trial_id: u32,
    pub embedding_status: EmbeddingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_b64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_text_sha256: Option<String>,
    pub embed_text_truncated: bool,
    pub embed_text_original_chars: u32,
    pub embed_text_final_chars: u32,
    pub truncation_reason: TruncationReason,
    pub dtype: String,
    pub encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmbeddingRecord {
    pub fn outcome(&self) -> EmbeddingOutcome {
        EmbeddingOutcome {
            embedding_status: self.embedding_status,
            dimensions: self.dimensions,
            embed_text_sha256: self.embed_text_sha256.clone(),
            embed_text_truncated: self.embed_text_truncated,
            embed_text_original_chars: self.embed_text_original_chars,
            embed_text_final_chars: self.embed_text_final_chars,
            truncation_reason: self.truncation_reason,
            generation_id: self.generation_id.clone(),
            skip_reason: self.skip_reason,
            error: self.error.clone(),
        }
    }

    /// Encode a float32 vector as little-endian base64, per the wire
    /// contract (`dtype: "float32"`, `encoding: "float32le_base64"`).
    pub fn encode_vector(vector: &[f32]) -> String {
        use base64::Engine;
        let mut bytes = Vec::with_capacity(vector.len() * 4);
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    /// Decode a little-endian base64 vector back into floats.
    pub fn decode_vector(encoded: &str) -> Result<Vec<f32>, String> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| e.to_string())?;
        if bytes.len() % 4 != 0 {
            return Err(format!(
                "embedding byte length {} is not a multiple of 4",
                bytes.len()
            ));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_round_trips_through_base64() {
        let vector = vec![1.0_f32, -2.5, 0.0, 3.125];
        let encoded = EmbeddingRecord::encode_vector(&vector);
        let decoded = EmbeddingRecord::decode_vector(&encoded).unwrap();
        assert_eq!(vector, decoded);
    }

    #[test]
    fn decode_rejects_truncated_byte_length() {
        let err = EmbeddingRecord::decode_vector("AAA").unwrap_err();
        assert!(!err.is_empty());
    }
}
