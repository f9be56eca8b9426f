//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//!
//! The reasoning service is opaque to the engine: transcript in, one
//! assistant turn out. Transport failures are retried a configured number
//! of times before surfacing as an external-service error.

use crate::capability::ToolDefinition;
use crate::config::LlmConfig;
use crate::error::ScoutError;
use crate::llm::{AssistantTurn, ChatMessage, ReasoningService, ToolCallMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Reasoning client over a chat-completions API.
#[derive(Debug)]
pub struct ReasoningClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    retries: usize,
    timeout_seconds: u64,
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

/// Chat-completions response body (the parts we read).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[allow(dead_code)] // Response field
    #[serde(default)]
    role: String,
    /// Null when the turn is pure tool calls.
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

impl ReasoningClient {
    /// Create a client from configuration. Fails fast when credentials are
    /// missing; the run must not start without a reasoning service.
    pub fn new(config: &LlmConfig) -> Result<Self, ScoutError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ScoutError::Configuration(format!(
                "reasoning service API key not set (export {})",
                config.api_key_env
            ))
        })?;

        if config.base_url.trim().is_empty() {
            return Err(ScoutError::Configuration(
                "reasoning service base URL is empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ScoutError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            retries: config.retries,
            timeout_seconds: config.timeout_seconds,
        })
    }

    async fn send_once(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, ScoutError> {
        let url = format!("{}/chat/completions", self.base_url);

        let tools_json = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| serde_json::to_value(t).unwrap_or_default())
                    .collect(),
            )
        };

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            tools: tools_json,
        };

        debug!("Sending chat request with {} messages", messages.len());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoutError::ExternalService(format!(
                        "reasoning request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    ScoutError::ExternalService(format!(
                        "cannot connect to reasoning service at {}",
                        self.base_url
                    ))
                } else {
                    ScoutError::ExternalService(format!("reasoning request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::ExternalService(format!(
                "reasoning service error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            ScoutError::DataParsing(format!("failed to parse reasoning response: {}", e))
        })?;

        let message = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| {
                ScoutError::DataParsing("reasoning response contained no choices".to_string())
            })?;

        let assistant = ChatMessage::assistant(
            message.content.unwrap_or_default(),
            message.tool_calls.filter(|calls| !calls.is_empty()),
        );
        Ok(AssistantTurn::from_message(assistant))
    }
}

#[async_trait]
impl ReasoningService for ReasoningClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, ScoutError> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            match self.send_once(messages, tools).await {
                Ok(turn) => return Ok(turn),
                // Parse failures are not transient; retrying re-sends the
                // same transcript to no benefit.
                Err(e @ ScoutError::DataParsing(_)) => return Err(e),
                Err(e) => {
                    if attempt < self.retries {
                        warn!(
                            "Reasoning call failed (attempt {}/{}): {}",
                            attempt + 1,
                            self.retries + 1,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ScoutError::ExternalService("reasoning call failed".to_string())))
    }
}
