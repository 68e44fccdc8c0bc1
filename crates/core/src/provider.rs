//! Provider trait — the abstraction over LLM backends.
//!
//! Every backend — a local inference daemon or a cloud API — is reduced to
//! the same four-operation contract: streamed generation, a bounded health
//! check, model enumeration, and a display name. The dispatcher and the
//! agent state machine never learn which backend they are talking to; new
//! backends are added purely by implementing this trait.

use crate::error::ProviderError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tuning knobs for a single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-call completion bound in seconds. Exceeding it is a classified
    /// `Timeout`, enforced by the dispatcher around the whole call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A finite, non-restartable sequence of streamed text fragments.
///
/// Each item is one fragment of the reply, in order; an `Err` item is a
/// classified mid-stream failure. The channel closing marks the end of the
/// sequence — network loss must surface as an `Err` item, never as a
/// silent early close.
pub type FragmentStream =
    tokio::sync::mpsc::Receiver<std::result::Result<String, ProviderError>>;

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// A stable human-readable label (e.g. "Ollama", "Anthropic Claude").
    fn name(&self) -> &str;

    /// Send a conversation and stream back the reply as text fragments.
    ///
    /// Setup failures (unreachable endpoint, bad credentials, unknown
    /// model) are returned directly; mid-stream failures arrive as `Err`
    /// items on the stream.
    async fn stream(
        &self,
        messages: &[Message],
        model: &str,
        options: &GenerateOptions,
    ) -> std::result::Result<FragmentStream, ProviderError>;

    /// Best-effort reachability and credential check.
    ///
    /// Never errors and never blocks longer than a short bounded timeout —
    /// failures collapse to `false`.
    async fn health_check(&self) -> bool;

    /// Best-effort model enumeration for UI population.
    ///
    /// Returns an empty list on failure rather than erroring, since
    /// callers use it for display, not control flow.
    async fn list_models(&self) -> Vec<String>;
}
