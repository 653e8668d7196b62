use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scribe_core::{CompletionRequest, LLMProvider, LLMResponse, Usage};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::retry::{RetryPolicy, retry_with_backoff};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Failure reported by (or about) the completion endpoint.
#[derive(Debug)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    /// Rate limits and server-side failures are worth another attempt;
    /// auth errors and malformed responses are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status.is_some_and(|s| s == 429 || s >= 500)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "OpenAI API call failed with status code {status} and message: {}",
                self.message
            ),
            None => write!(f, "OpenAI API call failed: {}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    organization: Option<String>,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(api_key: String, organization: Option<String>) -> Self {
        info!("Creating OpenAiProvider");
        Self {
            client: Client::new(),
            api_key,
            organization: organization.filter(|o| !o.is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::none(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> anyhow::Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Helper method to send a single request
    async fn try_send(&self, body: &Value) -> anyhow::Result<LLMResponse> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError {
                status: Some(status.as_u16()),
                message: error_message(&text),
            }
            .into());
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| ApiError {
            status: None,
            message: format!("malformed response body: {e}"),
        })?;
        Ok(parse_response(&value)?)
    }
}

/// JSON body for the chat-completions endpoint.
fn request_body(request: &CompletionRequest) -> Value {
    json!({
        "model": request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "messages": request.messages,
    })
}

fn parse_response(response: &Value) -> Result<LLMResponse, ApiError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ApiError {
            status: None,
            message: "Invalid response format: missing content".to_string(),
        })?
        .to_string();

    let count = |v: &Value| u32::try_from(v.as_u64().unwrap_or(0)).unwrap_or(u32::MAX);
    let usage = response["usage"].as_object().map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").map_or(0, count),
        completion_tokens: u.get("completion_tokens").map_or(0, count),
        total_tokens: u.get("total_tokens").map_or(0, count),
    });

    Ok(LLMResponse { content, usage })
}

/// The service's `error.message`, or the raw body when it has none.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<LLMResponse> {
        let body = request_body(request);

        debug!(
            "Sending request to OpenAI API: model={}, max_tokens={}",
            request.model, request.max_tokens
        );

        let response = retry_with_backoff(
            || self.try_send(&body),
            &self.retry,
            |e: &anyhow::Error| {
                e.downcast_ref::<ApiError>()
                    .is_none_or(ApiError::is_retryable)
            },
        )
        .await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Received response from OpenAI API: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
