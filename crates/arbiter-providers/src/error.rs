//! Provider-facing error classification.
//!
//! Split the way the executor needs it split: `ModelUnavailable` is a
//! distinct, retryable-differently category from a generic API error,
//! matching the trial status the executor must assign (§4.4, §4.5).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// The trial-error category string recorded in `TrialError.category`.
    pub fn category(&self) -> &'static str {
        match self {
            ProviderError::Timeout(_) => "timeout",
            ProviderError::ModelUnavailable(_) => "model_unavailable",
            ProviderError::Api { .. } => "provider_error",
            ProviderError::Parse(_) => "parse_error",
            ProviderError::Transport(_) => "transport_error",
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, ProviderError::ModelUnavailable(_))
    }
}
