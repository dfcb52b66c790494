//! ContextStore trait and store-side types

use palaver_core::{ParticipantId, SessionRef, TranscriptLine};
use serde::{Deserialize, Serialize};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out")]
    TimedOut,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Parameters for a bounded digest request.
#[derive(Clone, Debug, Serialize)]
pub struct DigestQuery {
    /// Size bound for the transcript, in tokens (not message count).
    pub token_budget: usize,
    /// The triggering message's content, used by the store for relevance
    /// ranking.
    pub trigger_text: String,
    /// Whose relationship narrative to include (usually the sender).
    pub target: ParticipantId,
    /// The responding agent — the narrative reflects this agent's view of
    /// the target, not a generic one.
    pub perspective: ParticipantId,
    /// Whether to include a conversation summary.
    pub summary: bool,
}

/// What the store returns for a digest request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DigestPayload {
    #[serde(default)]
    pub transcript: Vec<TranscriptLine>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
}

/// The relationship/context store collaborator, at its interface boundary.
///
/// Treated as at-least-once durable and eventually consistent. Utterance
/// ordering within a conversation is the store's acceptance order, not
/// client timestamps.
#[async_trait::async_trait]
pub trait ContextStore: Send + Sync {
    /// Verify the conversation exists and is writable.
    async fn conversation(&self, session: &SessionRef) -> StoreResult<()>;

    /// Ensure a participant handle exists for this id.
    async fn ensure_participant(&self, id: &ParticipantId) -> StoreResult<()>;

    /// Durably append one utterance to the conversation log.
    async fn record_utterance(
        &self,
        session: &SessionRef,
        speaker: &ParticipantId,
        content: &str,
    ) -> StoreResult<()>;

    /// Fetch a bounded context digest.
    async fn context_digest(
        &self,
        session: &SessionRef,
        query: &DigestQuery,
    ) -> StoreResult<DigestPayload>;

    /// Ask a natural-language question about a participant, answered from
    /// accumulated interaction history, scoped to the asker's perspective.
    async fn ask_relationship(
        &self,
        session: &SessionRef,
        target: &ParticipantId,
        question: &str,
        perspective: &ParticipantId,
    ) -> StoreResult<String>;

    /// Semantic search within the conversation. Empty results are valid.
    async fn search_conversation(
        &self,
        session: &SessionRef,
        query: &str,
    ) -> StoreResult<Vec<String>>;
}
