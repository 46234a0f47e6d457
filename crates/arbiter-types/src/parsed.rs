//! Parsed-output records: the result of extracting/validating a trial's
//! assistant text against an optional decision contract.

use serde::{Deserialize, Serialize};

use crate::config::EmbedTextSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Success,
    Fallback,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Fenced,
    Unfenced,
    Raw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedOutputRecord {
    pub trial_id: u32,
    pub parse_status: ParseStatus,
    pub extraction_method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub embed_text_source: EmbedTextSource,
    pub embed_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale_truncated: Option<bool>,
    pub parser_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl ParsedOutputRecord {
    pub fn is_eligible_for_embedding(&self, policy_excludes_non_success: bool) -> bool {
        if !policy_excludes_non_success {
            return true;
        }
        self.parse_status == ParseStatus::Success
    }
}
