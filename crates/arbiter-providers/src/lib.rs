//! Completion and embedding clients for the model(s) under study (§6).

pub mod client;
pub mod error;
pub mod rate_limit;

pub use client::{
    ChatMessage, CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse,
    OpenRouterClient, ProviderConfig,
};
pub use error::ProviderError;
pub use rate_limit::RateLimiter;
