/// LLM Client: the single point of entry for all language-model calls in the screener.
///
/// ARCHITECTURAL RULE: the matching pipeline only talks to the `LanguageModel` trait.
/// `LlmClient` is the production implementation over the Anthropic Messages API.
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmSettings;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
/// Temperature used for JSON replies.
const STRUCTURED_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Provider-neutral reply: text plus what the call cost and how long it took.
#[derive(Debug, Clone, Default)]
pub struct LlmReply {
    pub content: String,
    /// USD
    pub cost: f64,
    pub latency_ms: f64,
}

/// The call contract the matching pipeline depends on.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmReply, LlmError>;

    /// Like `generate`, but instructs the model to answer with JSON only and strips
    /// markdown fences from the reply. The content is best-effort JSON.
    async fn generate_structured(
        &self,
        prompt: &str,
        system: Option<&str>,
        schema: Option<&serde_json::Value>,
    ) -> Result<LlmReply, LlmError> {
        let system = structured_system_prompt(system, schema);
        let mut reply = self
            .generate(prompt, Some(&system), STRUCTURED_TEMPERATURE, None)
            .await?;
        reply.content = strip_json_fences(&reply.content).to_string();
        Ok(reply)
    }
}

/// Appends the JSON-only instruction (and the schema, if any) to a system prompt.
fn structured_system_prompt(system: Option<&str>, schema: Option<&serde_json::Value>) -> String {
    let mut out = system.unwrap_or_default().to_string();
    out.push_str("\n\n");
    out.push_str(prompts::JSON_ONLY_SYSTEM);
    if let Some(schema) = schema {
        let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        out.push_str("\n\nRequired JSON structure:\n");
        out.push_str(&rendered);
    }
    out
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Per-1k-token prices used to bill each successful call.
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub per_1k_input: f64,
    pub per_1k_output: f64,
}

impl Pricing {
    pub fn cost(&self, usage: &Usage) -> f64 {
        usage.input_tokens as f64 / 1000.0 * self.per_1k_input
            + usage.output_tokens as f64 / 1000.0 * self.per_1k_output
    }
}

/// Wraps the Anthropic Messages API with retry logic and cost accounting.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    max_retries: u32,
    attempt_timeout: Duration,
    pricing: Pricing,
}

impl LlmClient {
    pub fn new(api_key: String, settings: &LlmSettings) -> Result<Self, LlmError> {
        // Deadlines are applied per attempt in `with_retries`, not on the client.
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            model: settings.model.clone(),
            max_retries: settings.max_retries,
            attempt_timeout: settings.timeout,
            pricing: Pricing {
                per_1k_input: settings.cost_per_1k_input,
                per_1k_output: settings.cost_per_1k_output,
            },
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Makes a raw call to the API, returning the full response object.
    /// Retries on network errors, timeouts, 429 and 5xx with exponential backoff.
    /// Only the final successful response is ever billed.
    async fn call(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let body = &request_body;
        with_retries(self.max_retries, self.attempt_timeout, move || self.attempt(body)).await
    }

    /// One HTTP round trip. Retry policy lives in `with_retries`.
    async fn attempt(&self, request_body: &AnthropicRequest<'_>) -> Result<LlmResponse, LlmError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 429 || status.is_server_error() {
            warn!("LLM API returned {}: {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = serde_json::from_str(&body)?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<LlmReply, LlmError> {
        let started = Instant::now();
        let response = self.call(prompt, system, temperature, max_tokens).await?;
        let content = reply_text(&response)?.to_string();

        Ok(LlmReply {
            content,
            cost: self.pricing.cost(&response.usage),
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

/// The reply's text, or `EmptyContent` when there is no non-blank text block.
fn reply_text(response: &LlmResponse) -> Result<&str, LlmError> {
    response
        .text()
        .filter(|t| !t.trim().is_empty())
        .ok_or(LlmError::EmptyContent)
}

/// Network errors, timed-out attempts, 429 and 5xx are worth another attempt.
fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::Http(_) | LlmError::Timeout(_) => true,
        LlmError::Api { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Runs `attempt` up to `max_retries` times, each bounded by `attempt_timeout`,
/// backing off between attempts. A run that ends on 429 reports `RateLimited`.
async fn with_retries<T, F, Fut>(
    max_retries: u32,
    attempt_timeout: Duration,
    mut attempt: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_error: Option<LlmError> = None;

    for n in 0..max_retries {
        if n > 0 {
            let delay = backoff_delay(n);
            warn!(
                "LLM call attempt {} failed, retrying after {}ms...",
                n,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let result = tokio::time::timeout(attempt_timeout, attempt())
            .await
            .unwrap_or_else(|_| Err(LlmError::Timeout(attempt_timeout)));

        match result {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                debug!("Retryable LLM failure on attempt {}: {}", n + 1, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(match last_error {
        Some(LlmError::Api { status: 429, .. }) | None => LlmError::RateLimited {
            retries: max_retries,
        },
        Some(e) => e,
    })
}

/// Exponential backoff for retry `attempt` (1-based): 2s, 4s, 8s, capped at 10s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
