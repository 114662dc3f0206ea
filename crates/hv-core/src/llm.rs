//! Chat-completion client used by the analysis passes. The provider is
//! abstracted behind [`LanguageModel`] so the engine can be driven by a stub
//! in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response missing message content")]
    EmptyResponse,
    #[error("llm response was not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("llm configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Rate limiting and server-side failures are worth another attempt;
    /// everything else is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(err) => err.is_timeout() || err.is_connect(),
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Read configuration from `HV_LLM_*` variables, falling back to
    /// `OPENAI_API_KEY` for the key and gpt-4o-mini against the public
    /// OpenAI endpoint for everything else.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("HV_LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                LlmError::Config("HV_LLM_API_KEY or OPENAI_API_KEY must be set".to_string())
            })?;

        Ok(LlmConfig {
            api_key,
            model: env_or("HV_LLM_MODEL", "gpt-4o-mini"),
            endpoint: env_or(
                "HV_LLM_ENDPOINT",
                "https://api.openai.com/v1/chat/completions",
            ),
            temperature: env_or("HV_LLM_TEMPERATURE", "0.2")
                .parse()
                .map_err(|_| LlmError::Config("HV_LLM_TEMPERATURE must be a float".to_string()))?,
            max_tokens: env_or("HV_LLM_MAX_TOKENS", "1000")
                .parse()
                .map_err(|_| LlmError::Config("HV_LLM_MAX_TOKENS must be an integer".to_string()))?,
            timeout_secs: env_or("HV_LLM_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|_| LlmError::Config("HV_LLM_TIMEOUT_SECS must be an integer".to_string()))?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Seam between the analysis engine and the model provider. Implementations
/// must return the parsed JSON object the model produced.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible chat-completions client. JSON mode is always requested;
/// the analysis prompts all demand a JSON object back.
pub struct OpenAiChatModel {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(OpenAiChatModel { config, client })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, LlmError> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(serde_json::from_str(&content)?)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Rough request cost in USD using the published gpt-4o-mini rates. Token
/// counts are approximated as chars/4; good enough for budget dashboards.
pub fn estimate_cost_usd(prompt_chars: usize, completion_chars: usize) -> f64 {
    const INPUT_PER_MILLION: f64 = 0.15;
    const OUTPUT_PER_MILLION: f64 = 0.60;
    let input_tokens = prompt_chars as f64 / 4.0;
    let output_tokens = completion_chars as f64 / 4.0;
    (input_tokens * INPUT_PER_MILLION + output_tokens * OUTPUT_PER_MILLION) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(LlmError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(LlmError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!LlmError::Status {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!LlmError::EmptyResponse.is_retryable());
        assert!(!LlmError::Config("x".into()).is_retryable());
    }

    #[test]
    fn cost_estimate_uses_char_approximation() {
        // 4000 prompt chars = 1000 tokens, 400 completion chars = 100 tokens.
        let cost = estimate_cost_usd(4000, 400);
        let expected = (1000.0 * 0.15 + 100.0 * 0.60) / 1_000_000.0;
        assert!((cost - expected).abs() < 1e-12);
        assert_eq!(estimate_cost_usd(0, 0), 0.0);
    }
}
