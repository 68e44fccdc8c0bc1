//! Message and conversation history domain types.
//!
//! A conversation is an insertion-ordered sequence of messages owned by a
//! single agent. History is bounded: after each assistant reply it is
//! trimmed to the most recent `2 × max_turns` entries, always preserving a
//! leading system message when one exists.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (agent personality, rules)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// A single message in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An ordered, bounded log of exchanged turns for one agent.
///
/// Owned exclusively by its agent and mutated only from the real-time
/// thread; workers receive copies via [`ConversationHistory::snapshot`].
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationHistory {
    /// Create an empty history bounded to `max_turns` round-trip exchanges
    /// (one user + one assistant message each).
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// Create a history seeded with a system prompt.
    pub fn with_system(max_turns: usize, system_prompt: impl Into<String>) -> Self {
        let mut history = Self::new(max_turns);
        history.messages.push(Message::system(system_prompt));
        history
    }

    /// Append a message at the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Trim to the most recent `2 × max_turns` messages.
    ///
    /// A leading system message is preserved on top of that budget. Runs
    /// after each assistant append, never mid-request. Idempotent at or
    /// below the limit.
    pub fn trim(&mut self) {
        let keep = self.max_turns * 2;
        let leading_system = self
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System);

        let body_len = self.messages.len() - usize::from(leading_system);
        if body_len <= keep {
            return;
        }

        let drop_count = body_len - keep;
        let start = usize::from(leading_system);
        self.messages.drain(start..start + drop_count);
    }

    /// Copy of the current message sequence.
    ///
    /// Requests carry this copy across the worker thread boundary so the
    /// worker never reads the live history while this thread mutates it.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// The configured turn bound.
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
