//! Should-respond gate — the cheap first stage of the decision pipeline
//!
//! Biased toward silence: a missed reply is recoverable, a fabricated reply
//! to noise is not. The generation-backed strategy degrades to the heuristic
//! on malformed output, and to "do not respond" on backend failure.

use crate::persona::Persona;
use palaver_core::{ChannelMessage, ContextDigest, Decision};
use palaver_llm::{extract_json, GenerationBackend, GenerationRequest};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStrategy {
    /// Name/question pattern matching only. Zero external calls.
    Heuristic,
    /// One backend call with the digest; falls back to Heuristic on
    /// malformed output.
    Backed,
}

const INTERROGATIVES: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "which", "can", "could", "would", "will", "do",
    "does", "did", "is", "are", "should",
];

pub struct ResponseGate {
    strategy: GateStrategy,
    display_name: String,
    mention: Regex,
}

impl ResponseGate {
    pub fn new(persona: &Persona) -> Self {
        // Word-boundary match on display name or normalized id, either case.
        let pattern = format!(
            r"(?i)\b({}|{})\b",
            regex::escape(&persona.display_name),
            regex::escape(persona.id.as_str()),
        );
        let mention = Regex::new(&pattern)
            .unwrap_or_else(|_| Regex::new(r"\bimpossible-never-matches\b").unwrap());
        Self {
            strategy: persona.gate,
            display_name: persona.display_name.clone(),
            mention,
        }
    }

    /// Is this agent directly addressed by name or id?
    pub fn mentions(&self, text: &str) -> bool {
        self.mention.is_match(text)
    }

    fn is_interrogative(text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.contains('?') {
            return true;
        }
        trimmed
            .split_whitespace()
            .next()
            .map(|first| {
                let first = first.trim_matches(|c: char| !c.is_alphanumeric());
                INTERROGATIVES.iter().any(|w| first.eq_ignore_ascii_case(w))
            })
            .unwrap_or(false)
    }

    /// The heuristic strategy: mention beats question beats silence.
    pub fn heuristic(&self, message: &ChannelMessage) -> Decision {
        if self.mentions(&message.content) {
            Decision::respond("directly addressed by name", 0.9)
        } else if Self::is_interrogative(&message.content) {
            Decision::respond("open question in the room", 0.6)
        } else {
            Decision::silent("not addressed and no question", 0.8)
        }
    }

    /// Full gate: returns a decision object for any input. Only transport-level
    /// backend failure degrades further, and it degrades to silence.
    pub async fn decide(
        &self,
        message: &ChannelMessage,
        digest: &ContextDigest,
        backend: &dyn GenerationBackend,
        model: &str,
        timeout: Duration,
    ) -> Decision {
        match self.strategy {
            GateStrategy::Heuristic => self.heuristic(message),
            GateStrategy::Backed => {
                self.backed(message, digest, backend, model, timeout).await
            }
        }
    }

    async fn backed(
        &self,
        message: &ChannelMessage,
        digest: &ContextDigest,
        backend: &dyn GenerationBackend,
        model: &str,
        timeout: Duration,
    ) -> Decision {
        let system = format!(
            "You decide whether the agent \"{}\" should reply to a chat message. \
             Default to NOT responding. Respond only if one of these holds: the message \
             directly addresses {} by name; it asks {} an explicit question; it replies to \
             something {} said; or it is squarely about {}'s domain. Chatter between other \
             agents never warrants a reply unless {} is explicitly asked. \
             Answer with JSON only: {{\"should_respond\": bool, \"reason\": string, \
             \"confidence\": number between 0 and 1}}",
            self.display_name,
            self.display_name,
            self.display_name,
            self.display_name,
            self.display_name,
            self.display_name,
        );
        let user = format!(
            "Context:\n{}\n\nNew message from {}:\n{}",
            digest.render(),
            message.sender_id,
            message.content
        );
        let request = GenerationRequest {
            model: model.to_string(),
            max_tokens: Some(256),
            ..GenerationRequest::single(Some(system), user)
        };

        let text = match tokio::time::timeout(timeout, backend.complete(request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("gate backend failed, staying silent: {}", e);
                return Decision::silent("gate backend unavailable", 0.0);
            }
            Err(_) => {
                warn!("gate backend timed out, falling back to heuristic");
                return self.heuristic(message);
            }
        };

        match parse_decision(&text) {
            Some(decision) => decision,
            None => {
                debug!("unparseable gate output, falling back to heuristic");
                self.heuristic(message)
            }
        }
    }
}

/// Parse `{should_respond, reason, confidence}` out of model output, or absent.
fn parse_decision(text: &str) -> Option<Decision> {
    let value = extract_json(text)?;
    let should_respond = value.get("should_respond")?.as_bool()?;
    let reason = value
        .get("reason")
        .and_then(|r| r.as_str())
        .unwrap_or("unstated")
        .to_string();
    let confidence = value
        .get("confidence")
        .and_then(|c| c.as_f64())
        .unwrap_or(0.5) as f32;
    Some(if should_respond {
        Decision::respond(reason, confidence)
    } else {
        Decision::silent(reason, confidence)
    })
}
