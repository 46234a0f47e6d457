//! Embed-text selection, truncation, and skip-reason logic (§4.4, §4.7).
//!
//! Decides, for one trial, whether there is any text worth embedding at all
//! and if so what shape it takes before the embedding API is ever called —
//! kept separate from the API call itself so the decision is unit-testable
//! without a network dependency.

use arbiter_types::config::ContractFailurePolicy;
use arbiter_types::embedding::{SkipReason, TruncationReason};
use arbiter_types::parsed::{ParseStatus, ParsedOutputRecord};

pub enum PreparedEmbedText {
    Skip(SkipReason),
    Ready {
        text: String,
        original_chars: u32,
        final_chars: u32,
        truncated: bool,
        truncation_reason: TruncationReason,
    },
}

/// `trial_success` reflects the trial's overall status (§4.4): a failed or
/// timed-out trial never reaches embedding regardless of its parsed output.
pub fn prepare_embed_text(
    trial_success: bool,
    parsed: Option<&ParsedOutputRecord>,
    contract_failure_policy: ContractFailurePolicy,
    max_chars: u32,
) -> PreparedEmbedText {
    if !trial_success {
        return PreparedEmbedText::Skip(SkipReason::TrialNotSuccess);
    }

    let Some(parsed) = parsed else {
        return PreparedEmbedText::Skip(SkipReason::EmptyEmbedText);
    };

    let excludes_non_success = matches!(contract_failure_policy, ContractFailurePolicy::Exclude);
    if parsed.parse_status != ParseStatus::Success && excludes_non_success {
        return PreparedEmbedText::Skip(SkipReason::ContractParseExcluded);
    }

    let normalized = normalize_embed_text(&parsed.embed_text);
    if normalized.is_empty() {
        return PreparedEmbedText::Skip(SkipReason::EmptyEmbedText);
    }

    let original_chars = normalized.chars().count() as u32;
    let max = max_chars as usize;
    let (text, truncated) = if normalized.chars().count() > max {
        (normalized.chars().take(max).collect(), true)
    } else {
        (normalized, false)
    };
    let final_chars = text.chars().count() as u32;

    PreparedEmbedText::Ready {
        text,
        original_chars,
        final_chars,
        truncated,
        truncation_reason: if truncated {
            TruncationReason::MaxChars
        } else {
            TruncationReason::None
        },
    }
}

/// Normalizes raw embed text before truncation: CRLF line endings collapse
/// to LF, then trailing whitespace is trimmed.
fn normalize_embed_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::config::EmbedTextSource;
    use arbiter_types::parsed::ExtractionMethod;

    fn parsed(status: ParseStatus, text: &str) -> ParsedOutputRecord {
        ParsedOutputRecord {
            trial_id: 1,
            parse_status: status,
            extraction_method: ExtractionMethod::Unfenced,
            outcome: None,
            rationale: None,
            confidence: None,
            embed_text_source: EmbedTextSource::RawContent,
            embed_text: text.to_string(),
            rationale_truncated: None,
            parser_version: "1".to_string(),
            parse_error: None,
        }
    }

    #[test]
    fn failed_trial_is_skipped_regardless_of_parsed_output() {
        let p = parsed(ParseStatus::Success, "some text");
        let decision = prepare_embed_text(false, Some(&p), ContractFailurePolicy::Warn, 100);
        assert!(matches!(decision, PreparedEmbedText::Skip(SkipReason::TrialNotSuccess)));
    }

    #[test]
    fn empty_embed_text_is_skipped() {
        let p = parsed(ParseStatus::Success, "   ");
        let decision = prepare_embed_text(true, Some(&p), ContractFailurePolicy::Warn, 100);
        assert!(matches!(decision, PreparedEmbedText::Skip(SkipReason::EmptyEmbedText)));
    }

    #[test]
    fn exclude_policy_skips_non_success_parses() {
        let p = parsed(ParseStatus::Fallback, "partial json");
        let decision = prepare_embed_text(true, Some(&p), ContractFailurePolicy::Exclude, 100);
        assert!(matches!(
            decision,
            PreparedEmbedText::Skip(SkipReason::ContractParseExcluded)
        ));
    }

    #[test]
    fn warn_policy_still_embeds_non_success_parses() {
        let p = parsed(ParseStatus::Fallback, "partial json");
        let decision = prepare_embed_text(true, Some(&p), ContractFailurePolicy::Warn, 100);
        assert!(matches!(decision, PreparedEmbedText::Ready { .. }));
    }

    #[test]
    fn crlf_and_trailing_whitespace_are_normalized_before_storage() {
        let p = parsed(ParseStatus::Success, "line one\r\nline two\r\n   \n  ");
        let decision = prepare_embed_text(true, Some(&p), ContractFailurePolicy::Warn, 100);
        match decision {
            PreparedEmbedText::Ready { text, .. } => {
                assert_eq!(text, "line one\nline two");
            }
            _ => panic!("expected Ready"),
        }
    }

    #[test]
    fn long_text_is_truncated_to_max_chars() {
        let p = parsed(ParseStatus::Success, &"a".repeat(50));
        let decision = prepare_embed_text(true, Some(&p), ContractFailurePolicy::Warn, 10);
        match decision {
            PreparedEmbedText::Ready {
                final_chars,
                truncated,
                truncation_reason,
                ..
            } => {
                assert_eq!(final_chars, 10);
                assert!(truncated);
                assert_eq!(truncation_reason, TruncationReason::MaxChars);
            }
            _ => panic!("expected Ready"),
        }
    }
}
