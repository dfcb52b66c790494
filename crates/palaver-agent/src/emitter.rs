//! Response emission — generate, publish, record
//!
//! Emission and recording are not atomic. A recording failure after the
//! message is already on the channel is tolerated and logged; emission is
//! never retried for a bookkeeping failure, since that would duplicate the
//! visible message.

use crate::context::bounded;
use crate::persona::Persona;
use crate::planner::ToolTracker;
use crate::trust;
use palaver_core::{ChannelMessage, ContextDigest, SenderType, SessionRef};
use palaver_llm::{GenerationBackend, GenerationRequest};
use palaver_store::ContextStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct ResponseEmitter {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn ContextStore>,
    model: String,
    outbound: mpsc::Sender<ChannelMessage>,
    store_timeout: Duration,
    llm_timeout: Duration,
}

impl ResponseEmitter {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn ContextStore>,
        model: impl Into<String>,
        outbound: mpsc::Sender<ChannelMessage>,
        store_timeout: Duration,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            model: model.into(),
            outbound,
            store_timeout,
            llm_timeout,
        }
    }

    /// Generate the reply and, if non-blank, emit it then record it.
    /// Returns the emitted text, or `None` if the agent stayed silent.
    pub async fn generate_and_send(
        &self,
        persona: &Persona,
        session: &SessionRef,
        message: &ChannelMessage,
        digest: &ContextDigest,
        tracker: &ToolTracker,
        trust_score: i32,
    ) -> Option<String> {
        let mut system = persona.system_prompt.clone();
        if persona.tracks_trust() {
            system.push_str(&format!(
                "\nYour current disposition toward {} is {}. Let it color your tone, \
                 not whether you answer.",
                message.sender_id,
                trust::disposition(trust_score)
            ));
        }

        let mut user = format!("Context:\n{}\n", digest.render());
        if let Some(gathered) = tracker.render() {
            user.push('\n');
            user.push_str(&gathered);
            user.push('\n');
        }
        user.push_str(&format!(
            "\nNew message from {}:\n{}\n\nReply as {} in a few sentences.",
            message.sender_id, message.content, persona.display_name
        ));

        let request = GenerationRequest {
            model: self.model.clone(),
            max_tokens: Some(persona.response_max_tokens),
            temperature: Some(persona.temperature),
            ..GenerationRequest::single(Some(system), user)
        };

        let text = match tokio::time::timeout(self.llm_timeout, self.backend.complete(request)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(agent = %persona.id, "reply generation failed, staying silent: {}", e);
                return None;
            }
            Err(_) => {
                warn!(agent = %persona.id, "reply generation timed out, staying silent");
                return None;
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            // An empty reply is strictly worse than silence.
            info!(agent = %persona.id, "blank generation, suppressing reply");
            return None;
        }

        self.publish(persona, session, &text).await
    }

    /// Publish pre-written text (scene introductions) with the same
    /// emit-then-record discipline.
    pub async fn publish(
        &self,
        persona: &Persona,
        session: &SessionRef,
        text: &str,
    ) -> Option<String> {
        let outgoing = ChannelMessage::chat(persona.id.as_str(), SenderType::Agent, text);
        if let Err(e) = self.outbound.send(outgoing).await {
            warn!(agent = %persona.id, "channel closed, reply dropped: {}", e);
            return None;
        }

        if let Err(e) = bounded(
            self.store_timeout,
            self.store.record_utterance(session, &persona.id, text),
        )
        .await
        {
            // The emitted message is conversationally more important than
            // perfect bookkeeping. Log and move on; never re-emit.
            warn!(agent = %persona.id, "failed to record own reply: {}", e);
        }

        Some(text.to_string())
    }
}
