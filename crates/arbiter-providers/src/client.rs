//! An OpenRouter-compatible completion and embedding client.
//!
//! A `reqwest::Client` posts `{model, messages, ...}` to `/chat/completions`
//! and reads `choices[0].message.content`, for the single documented API
//! shape this engine targets (§6), plus an `/embeddings` counterpart for the
//! measurement layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbiter_types::config::DecodeParams;
use arbiter_types::trial::{MessageRole, Usage};

use crate::error::ProviderError;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ProviderConfig {
    /// Reads `OPENROUTER_BASE_URL` (falling back to the public endpoint) and
    /// the required `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| "OPENROUTER_API_KEY is not set".to_string())?;
        let base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
        Ok(Self { base_url, api_key })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub decode: DecodeParams,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub actual_model: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub vectors: Vec<Vec<f32>>,
    pub usage: Usage,
}

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatBodyMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    seed: u64,
}

#[derive(Serialize)]
struct ChatBodyMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Classifies an error body into `ModelUnavailable` vs a generic `Api`
/// error, following the provider-error categories the executor relies on
/// to pick a trial status (§4.4).
fn classify_error_body(status: u16, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or(body)
        .to_string();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .unwrap_or("");

    let looks_unavailable = status == 503
        || code.contains("model_not_available")
        || code.contains("model_unavailable")
        || message.to_lowercase().contains("model") && message.to_lowercase().contains("unavailable");

    if looks_unavailable {
        ProviderError::ModelUnavailable(message)
    } else {
        ProviderError::Api { status, message }
    }
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    config: ProviderConfig,
    limiter: RateLimiter,
}

impl OpenRouterClient {
    pub fn new(config: ProviderConfig, limiter: RateLimiter) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            limiter,
        }
    }

    pub async fn complete(
        &self,
        request: CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, ProviderError> {
        self.limiter.acquire().await;

        let body = ChatBody {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatBodyMessage {
                    role: role_str(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: request.decode.temperature,
            top_p: request.decode.top_p,
            max_tokens: request.decode.max_tokens,
            seed: request.decode.seed,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let send = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout(timeout.as_millis() as u64))??;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_error_body(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("invalid chat completion body: {e}")))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::Parse("no choices in completion response".to_string()))?;

        Ok(CompletionResponse {
            content,
            actual_model: parsed.model,
            usage: parsed
                .usage
                .map(|u| Usage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                    cost_usd: None,
                })
                .unwrap_or_default(),
        })
    }

    pub async fn embed(
        &self,
        request: EmbeddingRequest,
        timeout: Duration,
    ) -> Result<EmbeddingResponse, ProviderError> {
        self.limiter.acquire().await;

        let body = EmbeddingBody {
            model: &request.model,
            input: &request.input,
        };

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let send = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout(timeout.as_millis() as u64))??;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_error_body(status.as_u16(), &text));
        }

        let parsed: EmbeddingApiResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("invalid embedding body: {e}")))?;

        Ok(EmbeddingResponse {
            vectors: parsed.data.into_iter().map(|d| d.embedding).collect(),
            usage: parsed
                .usage
                .map(|u| Usage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                    cost_usd: None,
                })
                .unwrap_or_default(),
        })
    }
}
