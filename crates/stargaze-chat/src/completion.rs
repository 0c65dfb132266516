//! Text-completion service client.
//!
//! The pipeline talks to an OpenAI-compatible chat completions endpoint
//! (OpenRouter by default) through the [`CompletionClient`] trait, so the
//! generator can be driven by a scripted client in tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stargaze_core::config::CompletionConfig;
use stargaze_core::{StargazeError, Turn};

use crate::error::ChatError;

/// One call to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Ordered conversation sent as the prompt.
    pub messages: Vec<Turn>,
    /// Sampling temperature; omitted from the wire body when `None`.
    pub temperature: Option<f32>,
    /// Output token budget.
    pub max_tokens: u32,
}

/// Produces a completion text for a request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the trimmed completion text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError>;
}

// =============================================================================
// ApiKey
// =============================================================================

/// Bearer credential for the completion service. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the credential from `var`. A missing or blank value is an error.
    pub fn from_env(var: &str) -> Result<Self, StargazeError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(StargazeError::MissingCredential(var.to_string())),
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
    messages: &'a [Turn],
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// =============================================================================
// OpenRouterClient
// =============================================================================

/// reqwest client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: ApiKey,
}

impl OpenRouterClient {
    pub fn new(config: &CompletionConfig, api_key: ApiKey) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        let body = ChatCompletionBody {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: &request.messages,
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending completion request"
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::CompletionStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|e| ChatError::MalformedCompletion(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                ChatError::MalformedCompletion("no choices[0].message.content".to_string())
            })
    }
}
