//! Decision-contract parsing: strip fences → parse JSON → validate against
//! schema → extract the embed-relevant fields (§4.4).
//!
//! A "fenced, then unfenced, then best-effort raw" extraction ladder,
//! validated against a `jsonschema::Validator` compiled once and reused.

use arbiter_types::config::{DecisionContract, EmbedTextSource};
use arbiter_types::parsed::{ExtractionMethod, ParseStatus, ParsedOutputRecord};

const PARSER_VERSION: &str = "1";

/// A decision contract with its JSON Schema compiled once, reused across
/// every trial that shares the same contract.
pub struct CompiledContract {
    contract: DecisionContract,
    validator: jsonschema::Validator,
}

impl CompiledContract {
    pub fn compile(contract: DecisionContract) -> Result<Self, String> {
        let validator = jsonschema::validator_for(&contract.schema)
            .map_err(|e| format!("invalid decision contract schema: {e}"))?;
        Ok(Self { contract, validator })
    }

    pub fn contract(&self) -> &DecisionContract {
        &self.contract
    }
}

/// Strips a single ```-fenced block (with an optional language tag),
/// returning `None` when the text has no fence to strip.
fn fenced_block(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let rest = trimmed.strip_prefix("```")?;
    let content = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    content.strip_suffix("```").map(|s| s.trim().to_string())
}

/// Best-effort extraction of the first balanced-looking `{...}` span, used
/// only once fenced and unfenced parsing have both failed.
fn raw_brace_extract(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

struct Candidate {
    method: ExtractionMethod,
    text: String,
}

fn candidates(raw_text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    if let Some(fenced) = fenced_block(raw_text) {
        out.push(Candidate {
            method: ExtractionMethod::Fenced,
            text: fenced,
        });
    }
    out.push(Candidate {
        method: ExtractionMethod::Unfenced,
        text: raw_text.trim().to_string(),
    });
    if let Some(raw) = raw_brace_extract(raw_text) {
        out.push(Candidate {
            method: ExtractionMethod::Raw,
            text: raw,
        });
    }
    out
}

fn truncate_chars(text: &str, max_chars: u32) -> (String, bool) {
    let max = max_chars as usize;
    if text.chars().count() <= max {
        return (text.to_string(), false);
    }
    (text.chars().take(max).collect(), true)
}

fn select_embed_text(
    source: EmbedTextSource,
    outcome: Option<&serde_json::Value>,
    rationale: Option<&str>,
    raw_text: &str,
) -> String {
    match source {
        EmbedTextSource::Decision => outcome
            .map(|v| v.to_string())
            .or_else(|| rationale.map(|r| r.to_string()))
            .unwrap_or_else(|| raw_text.trim().to_string()),
        EmbedTextSource::Rationale => rationale
            .map(|r| r.to_string())
            .unwrap_or_else(|| raw_text.trim().to_string()),
        EmbedTextSource::RawContent => raw_text.trim().to_string(),
    }
}

/// Runs the full parsing pipeline for one trial's raw assistant text.
///
/// When `compiled` is `None` the trial's protocol has no decision contract:
/// the raw text is taken as-is, always `ParseStatus::Success`, embedded
/// via `EmbedTextSource::RawContent`.
pub fn parse_trial_output(
    trial_id: u32,
    raw_text: &str,
    compiled: Option<&CompiledContract>,
) -> ParsedOutputRecord {
    let Some(compiled) = compiled else {
        let embed_text = raw_text.trim().to_string();
        let parse_status = if embed_text.is_empty() {
            ParseStatus::Failed
        } else {
            ParseStatus::Success
        };
        return ParsedOutputRecord {
            trial_id,
            parse_status,
            extraction_method: ExtractionMethod::Raw,
            outcome: None,
            rationale: None,
            confidence: None,
            embed_text_source: EmbedTextSource::RawContent,
            embed_text,
            rationale_truncated: None,
            parser_version: PARSER_VERSION.to_string(),
            parse_error: None,
        };
    };

    let contract = compiled.contract();
    let mut first_parsed: Option<(ExtractionMethod, serde_json::Value)> = None;
    let mut last_error: Option<String> = None;

    for candidate in candidates(raw_text) {
        match serde_json::from_str::<serde_json::Value>(&candidate.text) {
            Ok(value) => {
                let errors: Vec<String> = compiled
                    .validator
                    .iter_errors(&value)
                    .map(|e| e.to_string())
                    .collect();
                if errors.is_empty() {
                    return build_success(trial_id, candidate.method, value, contract);
                }
                if first_parsed.is_none() {
                    first_parsed = Some((candidate.method, value));
                }
                last_error = Some(errors.join("; "));
            }
            Err(e) => {
                last_error = Some(e.to_string());
            }
        }
    }

    match first_parsed {
        Some((method, value)) => build_fallback(trial_id, method, value, contract, last_error),
        None => build_failed(trial_id, raw_text, contract, last_error),
    }
}

fn build_success(
    trial_id: u32,
    method: ExtractionMethod,
    value: serde_json::Value,
    contract: &DecisionContract,
) -> ParsedOutputRecord {
    let outcome = value.get("decision").cloned();
    let rationale = value
        .get("rationale")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let confidence = value.get("confidence").and_then(|v| v.as_f64());

    let (rationale, rationale_truncated) = match (&rationale, contract.rationale_max_chars) {
        (Some(text), Some(max)) => {
            let (truncated, was_truncated) = truncate_chars(text, max);
            (Some(truncated), Some(was_truncated))
        }
        (Some(text), None) => (Some(text.clone()), Some(false)),
        (None, _) => (None, None),
    };

    let embed_text = select_embed_text(
        contract.embed_text_source,
        outcome.as_ref(),
        rationale.as_deref(),
        "",
    );

    ParsedOutputRecord {
        trial_id,
        parse_status: ParseStatus::Success,
        extraction_method: method,
        outcome,
        rationale,
        confidence,
        embed_text_source: contract.embed_text_source,
        embed_text,
        rationale_truncated,
        parser_version: PARSER_VERSION.to_string(),
        parse_error: None,
    }
}

fn build_fallback(
    trial_id: u32,
    method: ExtractionMethod,
    value: serde_json::Value,
    contract: &DecisionContract,
    error: Option<String>,
) -> ParsedOutputRecord {
    // The JSON parsed but failed schema validation; still offer its text up
    // for embedding rather than discarding a trial's content entirely.
    let embed_text = value.to_string();
    ParsedOutputRecord {
        trial_id,
        parse_status: ParseStatus::Fallback,
        extraction_method: method,
        outcome: None,
        rationale: None,
        confidence: None,
        embed_text_source: contract.embed_text_source,
        embed_text,
        rationale_truncated: None,
        parser_version: PARSER_VERSION.to_string(),
        parse_error: error,
    }
}

fn build_failed(
    trial_id: u32,
    raw_text: &str,
    contract: &DecisionContract,
    error: Option<String>,
) -> ParsedOutputRecord {
    ParsedOutputRecord {
        trial_id,
        parse_status: ParseStatus::Failed,
        extraction_method: ExtractionMethod::Raw,
        outcome: None,
        rationale: None,
        confidence: None,
        embed_text_source: contract.embed_text_source,
        embed_text: raw_text.trim().to_string(),
        rationale_truncated: None,
        parser_version: PARSER_VERSION.to_string(),
        parse_error: error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract() -> CompiledContract {
        let schema = json!({
            "type": "object",
            "properties": {
                "decision": {"type": "string"},
                "rationale": {"type": "string"},
                "confidence": {"type": "number"}
            },
            "required": ["decision"]
        });
        CompiledContract::compile(DecisionContract {
            id: "test-contract".to_string(),
            sha256: "deadbeef".to_string(),
            schema,
            embed_text_source: EmbedTextSource::Decision,
            rationale_max_chars: Some(10),
        })
        .unwrap()
    }

    #[test]
    fn parses_fenced_json_against_schema() {
        let raw = "```json\n{\"decision\": \"yes\", \"rationale\": \"because reasons\", \"confidence\": 0.9}\n```";
        let parsed = parse_trial_output(1, raw, Some(&contract()));
        assert_eq!(parsed.parse_status, ParseStatus::Success);
        assert_eq!(parsed.extraction_method, ExtractionMethod::Fenced);
        assert_eq!(parsed.outcome, Some(json!("yes")));
        assert_eq!(parsed.rationale_truncated, Some(true));
    }

    #[test]
    fn parses_unfenced_json() {
        let raw = "{\"decision\": \"no\"}";
        let parsed = parse_trial_output(2, raw, Some(&contract()));
        assert_eq!(parsed.parse_status, ParseStatus::Success);
        assert_eq!(parsed.extraction_method, ExtractionMethod::Unfenced);
    }

    #[test]
    fn recovers_json_embedded_in_prose_as_raw() {
        let raw = "Sure, here you go: {\"decision\": \"maybe\"} hope that helps!";
        let parsed = parse_trial_output(3, raw, Some(&contract()));
        assert_eq!(parsed.parse_status, ParseStatus::Success);
        assert_eq!(parsed.extraction_method, ExtractionMethod::Raw);
    }

    #[test]
    fn schema_violation_is_a_fallback_not_a_failure() {
        let raw = "{\"rationale\": \"no decision field here\"}";
        let parsed = parse_trial_output(4, raw, Some(&contract()));
        assert_eq!(parsed.parse_status, ParseStatus::Fallback);
        assert!(parsed.outcome.is_none());
        assert!(parsed.parse_error.is_some());
    }

    #[test]
    fn non_json_text_is_failed() {
        let raw = "I cannot produce JSON for this.";
        let parsed = parse_trial_output(5, raw, Some(&contract()));
        assert_eq!(parsed.parse_status, ParseStatus::Failed);
        assert!(parsed.parse_error.is_some());
    }

    #[test]
    fn no_contract_succeeds_with_raw_content_when_non_empty() {
        let parsed = parse_trial_output(6, "free-form answer", None);
        assert_eq!(parsed.parse_status, ParseStatus::Success);
        assert_eq!(parsed.embed_text_source, EmbedTextSource::RawContent);
        assert_eq!(parsed.embed_text, "free-form answer");
    }

    #[test]
    fn no_contract_fails_on_empty_content() {
        let parsed = parse_trial_output(7, "   \n  ", None);
        assert_eq!(parsed.parse_status, ParseStatus::Failed);
        assert_eq!(parsed.embed_text, "");
    }
}
