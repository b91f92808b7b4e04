//! Hosted chat-completion backend for OpenAI-compatible APIs.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{BackendInfo, BackendKind, GenerationBackend, HostedConfig, Prompt};
use crate::error::{RagError, Result};

/// A [`GenerationBackend`] that calls `{base_url}/chat/completions`.
///
/// Works with OpenAI and any server that speaks the same protocol.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{HostedChatBackend, HostedConfig};
///
/// let backend = HostedChatBackend::new(HostedConfig::new("sk-..."))?;
/// ```
pub struct HostedChatBackend {
    client: reqwest::Client,
    config: HostedConfig,
    endpoint: String,
}

impl HostedChatBackend {
    /// Create a backend from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] if the API key is empty.
    pub fn new(config: HostedConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::ModelUnavailable {
                component: "generator".into(),
                message: "API key must not be empty".into(),
            });
        }
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self { client: reqwest::Client::new(), config, endpoint })
    }
}

// ── Chat completion request/response types ─────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl GenerationBackend for HostedChatBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Hosted,
            model: self.config.model.clone(),
            description: format!("Hosted chat completion at {}", self.config.base_url),
        }
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let failure = |message: String| RagError::GenerationFailure {
            backend: self.config.model.clone(),
            message,
        };

        debug!(model = %self.config.model, prompt_len = prompt.user.len(), "chat completion");

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.config.model, error = %e, "request failed");
                failure(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(model = %self.config.model, %status, "API error");
            return Err(failure(format!("API returned {status}: {detail}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(model = %self.config.model, error = %e, "failed to parse response");
            failure(format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| failure("API returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_unavailable() {
        let result = HostedChatBackend::new(HostedConfig::new("  "));
        assert!(matches!(result, Err(RagError::ModelUnavailable { .. })));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = HostedConfig::new("sk-test").with_base_url("http://localhost:8080/v1/");
        let backend = HostedChatBackend::new(config).unwrap();
        assert_eq!(backend.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(backend.info().kind, BackendKind::Hosted);
    }

    #[test]
    fn response_content_is_parsed() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"On the mat."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("On the mat."));
    }
}
