//! Anthropic native provider — the Messages API with SSE streaming.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field, not a message
//! - Text fragments arrive as `content_block_delta` events

use crate::sse::{LineBuffer, transport_error};
use async_trait::async_trait;
use futures::StreamExt;
use pixelprompt_core::error::ProviderError;
use pixelprompt_core::message::{Message, Role};
use pixelprompt_core::provider::{FragmentStream, GenerateOptions, Provider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Anthropic Claude cloud backend.
#[derive(Debug)]
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Override the base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Anthropic takes the system prompt as a top-level field; split it
    /// out of the message list.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<ApiMessage<'_>>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut api_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => api_messages.push(ApiMessage {
                    role: "user",
                    content: &msg.content,
                }),
                Role::Assistant => api_messages.push(ApiMessage {
                    role: "assistant",
                    content: &msg.content,
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, api_messages)
    }

    fn classify_status(status: u16, body: String) -> ProviderError {
        match status {
            401 | 403 => {
                ProviderError::AuthFailure("API key rejected by Anthropic".into())
            }
            404 => ProviderError::NotFound(body),
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            500..=599 => {
                ProviderError::Unreachable(format!("Anthropic server error {status}: {body}"))
            }
            _ => ProviderError::MalformedResponse(format!(
                "unexpected status {status} from Anthropic: {body}"
            )),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic Claude"
    }

    async fn stream(
        &self,
        messages: &[Message],
        model: &str,
        options: &GenerateOptions,
    ) -> std::result::Result<FragmentStream, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let (system, api_messages) = Self::extract_system(messages);

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": options.temperature,
            "stream": true,
        });

        if let Some(ref sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        debug!(model, "Sending Anthropic streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, &self.base_url))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic returned error");
            return Err(Self::classify_status(status, error_body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let base_url = self.base_url.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::Unreachable(format!(
                                "stream from {base_url} interrupted: {e}"
                            ))))
                            .await;
                        return;
                    }
                };

                lines.push(&bytes);

                while let Some(line) = lines.next_line() {
                    // SSE: skip blanks, comments, and `event:` markers —
                    // the event type is repeated inside the data payload.
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };

                    let event: StreamEvent = match serde_json::from_str(data.trim()) {
                        Ok(ev) => ev,
                        Err(e) => {
                            trace!(data, error = %e, "Ignoring unparseable SSE chunk");
                            continue;
                        }
                    };

                    match event.kind.as_str() {
                        "content_block_delta" => {
                            if let Some(text) = event.delta.and_then(|d| d.text)
                                && !text.is_empty()
                                && tx.send(Ok(text)).await.is_err()
                            {
                                return; // receiver dropped
                            }
                        }
                        "error" => {
                            let detail = event
                                .error
                                .map(|e| e.message)
                                .unwrap_or_else(|| "unknown stream error".into());
                            let _ = tx
                                .send(Err(ProviderError::MalformedResponse(detail)))
                                .await;
                            return;
                        }
                        "message_stop" => {
                            debug!("Anthropic stream completed");
                            return;
                        }
                        _ => {} // message_start, ping, content_block_start, ...
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Anthropic not available");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/v1/models", self.base_url);

        let response = match self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = r.status().as_u16(), "Failed to list Anthropic models");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to list Anthropic models");
                return Vec::new();
            }
        };

        let body: ModelsResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Failed to parse Anthropic model list");
                return Vec::new();
            }
        };

        body.data.into_iter().map(|m| m.id).collect()
    }
}

// --- Anthropic API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// One SSE `data: {...}` event from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    error: Option<EventError>,
}

#[derive(Debug, Deserialize)]
struct EventDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
