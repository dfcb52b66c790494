//! Generation backend trait

use crate::types::GenerationRequest;

/// Result type for generation operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Generation backend error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out")]
    TimedOut,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Generation backend trait.
///
/// Deliberately non-streaming: decision prompts and chat replies are short,
/// and callers only ever need the final text.
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Complete a request and return the generated text.
    async fn complete(&self, request: GenerationRequest) -> LlmResult<String>;
}
