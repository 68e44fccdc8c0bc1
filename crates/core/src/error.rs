//! Error types for the PixelPrompt domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Backend failures carry
//! a closed classification so the dispatcher can turn every one of them into
//! a response event without inspecting provider internals.

use thiserror::Error;

/// The top-level error type for PixelPrompt operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A classified backend failure.
///
/// The variants form a closed taxonomy: every failure a backend call can
/// produce — during setup or mid-stream — maps onto exactly one of these.
/// Raw backend error text lives in the variant payload for logging; the
/// user-facing wording comes from [`crate::dispatch::FailureKind`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Backend process or socket not reachable.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// No completion within the configured per-call bound.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Referenced model or backend unknown.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credential for an enabled cloud backend.
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// Backend-imposed throttling.
    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Unparseable or unusable streamed payload.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_detail() {
        let err = Error::Provider(ProviderError::Unreachable(
            "connection refused at localhost:11434".into(),
        ));
        assert!(err.to_string().contains("localhost:11434"));
    }

    #[test]
    fn rate_limited_displays_retry_hint() {
        let err = ProviderError::RateLimited {
            retry_after_secs: 5,
        };
        assert!(err.to_string().contains("5s"));
    }
}
