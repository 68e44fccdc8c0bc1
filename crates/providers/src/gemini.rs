//! Google Gemini provider — `streamGenerateContent` with `alt=sse`.
//!
//! Gemini has no assistant role; replies use role `model`, and the system
//! prompt rides in a top-level `system_instruction` field.

use crate::sse::{LineBuffer, transport_error};
use async_trait::async_trait;
use futures::StreamExt;
use pixelprompt_core::error::ProviderError;
use pixelprompt_core::message::{Message, Role};
use pixelprompt_core::provider::{FragmentStream, GenerateOptions, Provider};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Google Gemini cloud backend.
#[derive(Debug)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
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

    /// Split the system prompt out and map the rest to Gemini `contents`.
    fn build_request(messages: &[Message], options: &GenerateOptions) -> serde_json::Value {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{"text": msg.content}],
                })),
                Role::Assistant => contents.push(serde_json::json!({
                    "role": "model",
                    "parts": [{"text": msg.content}],
                })),
            }
        }

        let mut generation_config = serde_json::json!({
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            generation_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if !system_parts.is_empty() {
            body["system_instruction"] = serde_json::json!({
                "parts": [{"text": system_parts.join("\n\n")}],
            });
        }

        body
    }

    fn classify_status(status: u16, body: String) -> ProviderError {
        match status {
            400 | 401 | 403 => {
                ProviderError::AuthFailure("API key rejected by Gemini".into())
            }
            404 => ProviderError::NotFound(body),
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            500..=599 => {
                ProviderError::Unreachable(format!("Gemini server error {status}: {body}"))
            }
            _ => ProviderError::MalformedResponse(format!(
                "unexpected status {status} from Gemini: {body}"
            )),
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "Google Gemini"
    }

    async fn stream(
        &self,
        messages: &[Message],
        model: &str,
        options: &GenerateOptions,
    ) -> std::result::Result<FragmentStream, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            self.base_url
        );
        let body = Self::build_request(messages, options);

        debug!(model, "Sending Gemini streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, &self.base_url))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
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
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };

                    let chunk: StreamChunk = match serde_json::from_str(data.trim()) {
                        Ok(c) => c,
                        Err(e) => {
                            trace!(data, error = %e, "Ignoring unparseable SSE chunk");
                            continue;
                        }
                    };

                    for candidate in chunk.candidates {
                        let Some(content) = candidate.content else {
                            continue;
                        };
                        for part in content.parts {
                            if let Some(text) = part.text
                                && !text.is_empty()
                                && tx.send(Ok(text)).await.is_err()
                            {
                                return; // receiver dropped
                            }
                        }
                    }
                }
            }
            // Gemini has no explicit stop event; end of body ends the stream.
            debug!("Gemini stream completed");
        });

        Ok(rx)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1beta/models", self.base_url);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Gemini not available");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/v1beta/models", self.base_url);

        let response = match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = r.status().as_u16(), "Failed to list Gemini models");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to list Gemini models");
                return Vec::new();
            }
        };

        let body: ModelsResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Failed to parse Gemini model list");
                return Vec::new();
            }
        };

        body.models
            .into_iter()
            .map(|m| {
                m.name
                    .strip_prefix("models/")
                    .map(str::to_string)
                    .unwrap_or(m.name)
            })
            .collect()
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_maps_roles_and_system() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::assistant("Hello!"),
        ];
        let options = GenerateOptions::default();
        let body = GeminiProvider::build_request(&messages, &options);

        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "Be brief."
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "Hello!");
    }

    #[test]
    fn request_without_system_omits_instruction() {
        let body = GeminiProvider::build_request(&[Message::user("Hi")], &GenerateOptions::default());
        assert!(body.get("system_instruction").is_none());
    }

    #[test]
    fn max_tokens_maps_to_generation_config() {
        let options = GenerateOptions {
            max_tokens: Some(256),
            ..Default::default()
        };
        let body = GeminiProvider::build_request(&[Message::user("Hi")], &options);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn parse_stream_chunk() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Why did"}],"role":"model"},"index":0}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        let text = chunk.candidates[0].content.as_ref().unwrap().parts[0]
            .text
            .as_deref();
        assert_eq!(text, Some("Why did"));
    }

    #[test]
    fn model_names_strip_prefix() {
        let body = r#"{"models":[{"name":"models/gemini-2.0-flash"},{"name":"models/gemini-1.5-pro"}]}"#;
        let parsed: ModelsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<String> = parsed
            .models
            .into_iter()
            .map(|m| m.name.strip_prefix("models/").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["gemini-2.0-flash", "gemini-1.5-pro"]);
    }

    #[test]
    fn bad_key_status_classified() {
        let err = GeminiProvider::classify_status(403, "forbidden".into());
        assert!(matches!(err, ProviderError::AuthFailure(_)));
    }
}
