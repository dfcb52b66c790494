//! Context assembly — the bounded digest an agent reasons over
//!
//! One durable write per call: the incoming utterance is recorded before this
//! returns, so concurrent decisions by other agents (and this agent's own
//! later tool calls) observe it. Not idempotent — dedup happens upstream.

use palaver_core::{ChannelMessage, ContextDigest, ParticipantId, SessionRef};
use palaver_store::{ContextStore, DigestQuery, StoreError, StoreResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ContextAssembler {
    store: Arc<dyn ContextStore>,
    /// The responding agent — digests are built from this perspective.
    perspective: ParticipantId,
    token_budget: usize,
    store_timeout: Duration,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<dyn ContextStore>,
        perspective: ParticipantId,
        token_budget: usize,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            perspective,
            token_budget,
            store_timeout,
        }
    }

    /// Build the digest for one incoming message, recording it durably first.
    ///
    /// Any failure here is fatal to this message's pipeline: answering without
    /// context produces incoherent replies, and proceeding with an unrecorded
    /// message would drift what was stored from what was reasoned over.
    pub async fn prepare(
        &self,
        session: &SessionRef,
        incoming: &ChannelMessage,
    ) -> StoreResult<ContextDigest> {
        let sender = ParticipantId::normalize(&incoming.sender_id);

        let (conversation, participant) = tokio::join!(
            bounded(self.store_timeout, self.store.conversation(session)),
            bounded(self.store_timeout, self.store.ensure_participant(&sender)),
        );
        conversation?;
        participant?;

        bounded(
            self.store_timeout,
            self.store
                .record_utterance(session, &sender, &incoming.content),
        )
        .await?;

        let query = DigestQuery {
            token_budget: self.token_budget,
            trigger_text: incoming.content.clone(),
            target: sender.clone(),
            perspective: self.perspective.clone(),
            summary: true,
        };
        let payload = bounded(
            self.store_timeout,
            self.store.context_digest(session, &query),
        )
        .await?;

        // System/meta turns never reach the prompt.
        let transcript = payload
            .transcript
            .into_iter()
            .filter(|line| line.speaker != "system" && !line.content.trim().is_empty())
            .collect();

        let digest = ContextDigest {
            transcript,
            summary: payload.summary.filter(|s| !s.trim().is_empty()),
            relationship: payload.relationship.filter(|s| !s.trim().is_empty()),
            perspective: self.perspective.clone(),
        };
        debug!(
            session = %session,
            sender = %sender,
            lines = digest.transcript.len(),
            empty = digest.is_empty(),
            "context assembled"
        );
        Ok(digest)
    }
}

/// Apply the store timeout to one call.
pub async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::TimedOut),
    }
}
