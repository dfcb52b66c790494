//! Toolbox — the two optional information-gathering tools
//!
//! Both are read-only against the conversation log. Malformed tool input from
//! the backend is an empty result, never a pipeline error.

use crate::context::bounded;
use palaver_core::{ChannelMessage, ContextDigest, ParticipantId, SessionRef};
use palaver_llm::{extract_json, GenerationBackend, GenerationRequest};
use palaver_store::ContextStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Toolbox {
    store: Arc<dyn ContextStore>,
    backend: Arc<dyn GenerationBackend>,
    model: String,
    perspective: ParticipantId,
    store_timeout: Duration,
    llm_timeout: Duration,
}

impl Toolbox {
    pub fn new(
        store: Arc<dyn ContextStore>,
        backend: Arc<dyn GenerationBackend>,
        model: impl Into<String>,
        perspective: ParticipantId,
        store_timeout: Duration,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            model: model.into(),
            perspective,
            store_timeout,
            llm_timeout,
        }
    }

    async fn formulate(&self, system: String, user: String) -> Option<serde_json::Value> {
        let request = GenerationRequest {
            model: self.model.clone(),
            max_tokens: Some(256),
            ..GenerationRequest::single(Some(system), user)
        };
        match tokio::time::timeout(self.llm_timeout, self.backend.complete(request)).await {
            Ok(Ok(text)) => extract_json(&text),
            Ok(Err(e)) => {
                debug!("tool input formulation failed: {}", e);
                None
            }
            Err(_) => {
                debug!("tool input formulation timed out");
                None
            }
        }
    }

    /// Ask the store what this agent knows about a participant that would help
    /// the reply. The backend picks the target and the question.
    pub async fn relationship_insight(
        &self,
        session: &SessionRef,
        message: &ChannelMessage,
        digest: &ContextDigest,
    ) -> Option<String> {
        let system = "Pick one participant from the conversation and one short question about \
                      them whose answer would improve the reply. Answer with JSON only: \
                      {\"target\": string, \"question\": string}"
            .to_string();
        let user = format!(
            "Context:\n{}\n\nMessage being answered (from {}):\n{}",
            digest.render(),
            message.sender_id,
            message.content
        );
        let value = self.formulate(system, user).await?;
        let target = value.get("target")?.as_str()?.trim();
        let question = value.get("question")?.as_str()?.trim();
        if target.is_empty() || question.is_empty() {
            return None;
        }

        let target = ParticipantId::normalize(target);
        match bounded(
            self.store_timeout,
            self.store
                .ask_relationship(session, &target, question, &self.perspective),
        )
        .await
        {
            Ok(answer) if !answer.trim().is_empty() => {
                debug!(target = %target, "relationship insight gathered");
                Some(answer)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("relationship query failed: {}", e);
                None
            }
        }
    }

    /// Semantic search within the conversation. The backend formulates a short
    /// query. `Some(vec![])` is a valid outcome — no matches is an answer.
    pub async fn history_search(
        &self,
        session: &SessionRef,
        message: &ChannelMessage,
        digest: &ContextDigest,
    ) -> Option<Vec<String>> {
        let system = "Write one short search query (a few words) to find past conversation \
                      messages relevant to the reply. Answer with JSON only: \
                      {\"query\": string}"
            .to_string();
        let user = format!(
            "Context:\n{}\n\nMessage being answered (from {}):\n{}",
            digest.render(),
            message.sender_id,
            message.content
        );
        let value = self.formulate(system, user).await?;
        let query = value.get("query")?.as_str()?.trim().to_string();
        if query.is_empty() {
            return None;
        }

        match bounded(
            self.store_timeout,
            self.store.search_conversation(session, &query),
        )
        .await
        {
            Ok(matches) => {
                debug!(query = %query, hits = matches.len(), "history search done");
                Some(matches)
            }
            Err(e) => {
                warn!("history search failed: {}", e);
                None
            }
        }
    }
}
