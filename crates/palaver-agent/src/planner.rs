//! Tool-use loop — bounded iteration from decision to reply
//!
//! An explicit round loop rather than recursion, so the termination bound is
//! structural: at most `max_rounds` backend choices, each tool usable once per
//! message, and every failure path falls through to responding. Availability
//! of a reply outweighs optimality of the reasoning trace.

use crate::toolbox::Toolbox;
use palaver_core::{ChannelMessage, ContextDigest, SessionRef, ToolChoice, ToolKind};
use palaver_llm::{extract_json, GenerationBackend, GenerationRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MAX_TOOL_ROUNDS: usize = 3;

/// Per-message scratch space for gathered tool results. Presence of a field
/// is what marks a tool as used — not a count.
#[derive(Clone, Debug, Default)]
pub struct ToolTracker {
    pub relationship_insight: Option<String>,
    pub history_matches: Option<Vec<String>>,
}

impl ToolTracker {
    pub fn used(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::RelationshipInsight => self.relationship_insight.is_some(),
            ToolKind::HistorySearch => self.history_matches.is_some(),
            ToolKind::RespondNow => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relationship_insight.is_none() && self.history_matches.is_none()
    }

    /// Render gathered results as labeled, human-readable text for the final
    /// prompt. Never expose raw structures to the model.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut out = String::new();
        if let Some(ref insight) = self.relationship_insight {
            out.push_str("Relationship insight:\n");
            out.push_str(insight);
            out.push('\n');
        }
        if let Some(ref matches) = self.history_matches {
            if matches.is_empty() {
                out.push_str("History search: no matches.\n");
            } else {
                out.push_str("History search results:\n");
                for m in matches {
                    out.push_str("- ");
                    out.push_str(m);
                    out.push('\n');
                }
            }
        }
        Some(out.trim_end().to_string())
    }
}

pub struct ResponsePlanner {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    max_rounds: usize,
    llm_timeout: Duration,
}

impl ResponsePlanner {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        model: impl Into<String>,
        max_rounds: usize,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            max_rounds: max_rounds.max(1),
            llm_timeout,
        }
    }

    /// Run the bounded tool loop and return whatever was gathered. The caller
    /// performs the single terminal generation with the returned tracker.
    pub async fn plan(
        &self,
        session: &SessionRef,
        message: &ChannelMessage,
        digest: &ContextDigest,
        toolbox: &Toolbox,
    ) -> ToolTracker {
        let mut tracker = ToolTracker::default();

        for round in 1..=self.max_rounds {
            let choice = match self.choose(message, digest, &tracker).await {
                Some(choice) => choice,
                None => {
                    debug!(round, "unparseable tool choice, responding now");
                    return tracker;
                }
            };
            debug!(round, kind = %choice.kind, reason = %choice.reason, "tool choice");

            match choice.kind {
                ToolKind::RespondNow => return tracker,
                kind if tracker.used(kind) => {
                    // Repeat pick of a spent tool ends the loop; retrying
                    // forever is the failure mode this guards against.
                    debug!(round, kind = %kind, "tool already used, responding now");
                    return tracker;
                }
                ToolKind::RelationshipInsight => {
                    match toolbox.relationship_insight(session, message, digest).await {
                        Some(insight) => tracker.relationship_insight = Some(insight),
                        None => {
                            debug!(round, "relationship insight unusable, responding now");
                            return tracker;
                        }
                    }
                }
                ToolKind::HistorySearch => {
                    match toolbox.history_search(session, message, digest).await {
                        Some(matches) => tracker.history_matches = Some(matches),
                        None => {
                            debug!(round, "history search unusable, responding now");
                            return tracker;
                        }
                    }
                }
            }
        }

        // Round cap reached without an explicit respond-now. Not an error,
        // but operators watch for it — it means the policy is thrashing.
        warn!(forced = true, rounds = self.max_rounds, "tool round cap hit, forcing response");
        tracker
    }

    async fn choose(
        &self,
        message: &ChannelMessage,
        digest: &ContextDigest,
        tracker: &ToolTracker,
    ) -> Option<ToolChoice> {
        let mut available = vec![ToolKind::RespondNow.as_str()];
        if !tracker.used(ToolKind::RelationshipInsight) {
            available.push(ToolKind::RelationshipInsight.as_str());
        }
        if !tracker.used(ToolKind::HistorySearch) {
            available.push(ToolKind::HistorySearch.as_str());
        }

        let system = format!(
            "You are planning a chat reply. Choose the next step from: {}. \
             Use relationship-insight to recall what you know about a participant, \
             history-search to find earlier messages, and respond-now when you have \
             enough. Prefer respond-now unless a tool would clearly improve the reply. \
             Answer with JSON only: {{\"tool\": string, \"reason\": string, \
             \"confidence\": number between 0 and 1}}",
            available.join(", ")
        );
        let mut user = format!(
            "Context:\n{}\n\nMessage being answered (from {}):\n{}",
            digest.render(),
            message.sender_id,
            message.content
        );
        if let Some(gathered) = tracker.render() {
            user.push_str("\n\nAlready gathered:\n");
            user.push_str(&gathered);
        }

        let request = GenerationRequest {
            model: self.model.clone(),
            max_tokens: Some(256),
            ..GenerationRequest::single(Some(system), user)
        };
        let text = match tokio::time::timeout(self.llm_timeout, self.backend.complete(request)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                info!("tool choice backend failed, responding now: {}", e);
                return None;
            }
            Err(_) => {
                info!("tool choice timed out, responding now");
                return None;
            }
        };

        parse_choice(&text)
    }
}

/// Parse `{tool, reason, confidence}` out of model output, or absent.
fn parse_choice(text: &str) -> Option<ToolChoice> {
    let value = extract_json(text)?;
    let kind = ToolKind::parse(value.get("tool")?.as_str()?)?;
    let reason = value
        .get("reason")
        .and_then(|r| r.as_str())
        .unwrap_or("unstated")
        .to_string();
    let confidence = value
        .get("confidence")
        .and_then(|c| c.as_f64())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0) as f32;
    Some(ToolChoice {
        kind,
        reason,
        confidence,
    })
}
