//! # PixelPrompt Core
//!
//! Domain types, traits, and error definitions for the PixelPrompt agent
//! engine. This crate defines the model that all other crates implement
//! against: messages and bounded conversation history, the per-agent
//! behavioral state machine, the provider abstraction over LLM backends,
//! and the request/response events that cross the worker thread boundary.
//!
//! Nothing in this crate performs I/O — backends live in
//! `pixelprompt-providers`, the background dispatcher in
//! `pixelprompt-runtime`.

pub mod agent;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentState, StateTick};
pub use dispatch::{FailureKind, InferenceRequest, ResponseEvent, ResponseOutcome};
pub use error::{Error, ProviderError, Result};
pub use message::{ConversationHistory, Message, Role};
pub use provider::{FragmentStream, GenerateOptions, Provider};
