//! Ollama provider — local inference over the native `/api/chat` endpoint.
//!
//! Streams newline-delimited JSON chunks; each chunk carries a
//! `message.content` fragment and the final one sets `done: true`.
//! No credentials needed; health and model listing go through `/api/tags`.

use crate::sse::{LineBuffer, transport_error};
use async_trait::async_trait;
use futures::StreamExt;
use pixelprompt_core::error::ProviderError;
use pixelprompt_core::message::{Message, Role};
use pixelprompt_core::provider::{FragmentStream, GenerateOptions, Provider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Bound on health/model-listing probes, independent of the chat timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Local Ollama backend for free, offline inference.
#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// `timeout_secs` bounds connection setup; total completion time is
    /// bounded separately by the dispatcher's per-call timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn stream(
        &self,
        messages: &[Message],
        model: &str,
        options: &GenerateOptions,
    ) -> std::result::Result<FragmentStream, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut chat_options = serde_json::json!({
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            chat_options["num_predict"] = serde_json::json!(max_tokens);
        }

        let body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(messages),
            "stream": true,
            "options": chat_options,
        });

        debug!(model, url = %url, "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, &self.base_url))?;

        let status = response.status().as_u16();

        if status == 404 {
            return Err(ProviderError::NotFound(format!(
                "model '{model}' not found. Run: ollama pull {model}"
            )));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(ProviderError::MalformedResponse(format!(
                "unexpected status {status} from Ollama: {error_body}"
            )));
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
                    if line.is_empty() {
                        continue;
                    }

                    let chunk: ChatChunk = match serde_json::from_str(&line) {
                        Ok(c) => c,
                        Err(e) => {
                            // One garbled chunk is skipped, not fatal.
                            warn!(error = %e, "Failed to parse Ollama chunk");
                            continue;
                        }
                    };

                    if let Some(message) = chunk.message
                        && !message.content.is_empty()
                        && tx.send(Ok(message.content)).await.is_err()
                    {
                        return; // receiver dropped
                    }

                    if chunk.done {
                        debug!("Ollama stream completed");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => {
                let available = response.status().is_success();
                if !available {
                    warn!(status = response.status().as_u16(), "Ollama health check failed");
                }
                available
            }
            Err(e) => {
                warn!(error = %e, "Ollama not available");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);

        let response = match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Failed to list Ollama models");
                return Vec::new();
            }
        };

        let tags: TagsResponse = match response.json().await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "Failed to parse Ollama model list");
                return Vec::new();
            }
        };

        tags.models.into_iter().map(|m| m.name).collect()
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// One newline-delimited chunk from `/api/chat`.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_stripped() {
        let provider = OllamaProvider::new("http://localhost:11434/", 30);
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::assistant("Hello!"),
        ];
        let api = OllamaProvider::to_api_messages(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(api[2].content, "Hello!");
    }

    #[test]
    fn parse_content_chunk() {
        let line = r#"{"model":"llama3.2:3b","message":{"role":"assistant","content":"Why did"},"done":false}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        assert_eq!(chunk.message.unwrap().content, "Why did");
        assert!(!chunk.done);
    }

    #[test]
    fn parse_done_chunk() {
        let line = r#"{"model":"llama3.2:3b","message":{"role":"assistant","content":""},"done":true,"total_duration":12345}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        assert!(chunk.done);
        assert!(chunk.message.unwrap().content.is_empty());
    }

    #[test]
    fn parse_tags_response() {
        let body = r#"{"models":[{"name":"llama3.2:3b","size":2019393189},{"name":"qwen2:1.5b","size":934953407}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<_> = tags.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["llama3.2:3b", "qwen2:1.5b"]);
    }
}
