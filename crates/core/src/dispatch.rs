//! Request and response events crossing the worker thread boundary.
//!
//! A request carries everything the worker needs — including a detached
//! copy of the conversation history — so no live state is shared between
//! the real-time thread and the worker. Only the terminal result of a
//! backend call crosses back; fragments never do.

use crate::error::ProviderError;
use crate::message::Message;
use crate::provider::GenerateOptions;

/// A queued generation request for one agent.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// The agent awaiting this reply.
    pub agent_id: String,

    /// Which configured backend to use.
    pub provider: String,

    /// Model identifier for that backend.
    pub model: String,

    /// The new user message text.
    pub message: String,

    /// Copy of the history at dispatch time, before the user message was
    /// appended to the live log.
    pub history: Vec<Message>,

    /// Generation tuning for this call.
    pub options: GenerateOptions,
}

/// The terminal result of one request.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    /// Matches the `agent_id` of the originating request.
    pub agent_id: String,

    pub outcome: ResponseOutcome,
}

#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// The fully accumulated reply text.
    Success { text: String },

    /// A classified failure with a short technical detail for logging.
    Failure { kind: FailureKind, detail: String },
}

/// The closed failure classification carried by failure events.
///
/// Mirrors [`ProviderError`] without the payloads: the orchestrator treats
/// every kind identically at the state-machine level, but surfaces
/// different wording per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unreachable,
    Timeout,
    NotFound,
    AuthFailure,
    RateLimited,
    MalformedResponse,
}

impl FailureKind {
    /// The non-technical message shown to the user while the agent is in
    /// the error state. Raw backend error text is never displayed.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unreachable => "I can't reach my model right now. Is the backend running?",
            Self::Timeout => "That took too long and I gave up. Try asking again.",
            Self::NotFound => "My model isn't available on this backend.",
            Self::AuthFailure => "My API credentials were rejected. Check the configured key.",
            Self::RateLimited => "I'm being rate limited. Give me a moment and try again.",
            Self::MalformedResponse => "I got a garbled reply from my model. Try asking again.",
        }
    }
}

impl From<&ProviderError> for FailureKind {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::Unreachable(_) => Self::Unreachable,
            ProviderError::Timeout(_) => Self::Timeout,
            ProviderError::NotFound(_) => Self::NotFound,
            ProviderError::AuthFailure(_) => Self::AuthFailure,
            ProviderError::RateLimited { .. } => Self::RateLimited,
            ProviderError::MalformedResponse(_) => Self::MalformedResponse,
        }
    }
}

impl ResponseOutcome {
    /// Build a failure outcome from a classified provider error.
    pub fn failure(err: &ProviderError) -> Self {
        Self::Failure {
            kind: FailureKind::from(err),
            detail: err.to_string(),
        }
    }
}
