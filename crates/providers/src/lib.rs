//! LLM backend implementations for PixelPrompt.
//!
//! Every backend implements [`pixelprompt_core::Provider`]: streamed text
//! generation, a bounded health check, and model enumeration. The
//! [`registry`] builds the enabled set from configuration by name — adding
//! a backend means implementing the trait and adding one registry arm.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod registry;

mod sse;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use registry::build_providers;
