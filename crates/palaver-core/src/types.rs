//! Core types for Palaver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Conversation reference - cheaply cloneable
///
/// Assigned by the channel after connecting; swapped atomically on a session
/// reset. Pipelines capture it by value at start and never observe a mid-flight
/// change.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionRef(Arc<str>);

impl SessionRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionRef {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Normalized participant identifier.
///
/// Derived deterministically from a display name so relationship lookups stay
/// stable: alphanumerics plus `_`/`-` are kept, everything else becomes `_`,
/// repeated separators collapse, and leading/trailing separators are trimmed.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn normalize(display_name: &str) -> Self {
        let mut out = String::with_capacity(display_name.len());
        let mut prev_sep = true; // trims leading separators
        for c in display_name.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c);
                prev_sep = false;
            } else if (c == '_' || c == '-') && !prev_sep {
                out.push(c);
                prev_sep = true;
            } else if c.is_whitespace() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
            // anything else is dropped
        }
        while out.ends_with('_') || out.ends_with('-') {
            out.pop();
        }
        if out.is_empty() {
            out.push_str("participant");
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent a channel message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Human,
    Agent,
    System,
}

/// Kind of channel message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    System,
    Join,
    Leave,
}

/// Message metadata carried on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageMeta {
    pub timestamp: DateTime<Utc>,
    pub sender_type: SenderType,
    /// Conversation reference push — set on `system` frames that assign or
    /// reset the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// A message on the shared channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChannelMessage {
    pub id: String,
    pub sender_id: String,
    pub kind: MessageKind,
    pub content: String,
    pub meta: MessageMeta,
}

impl ChannelMessage {
    pub fn chat(sender_id: impl Into<String>, sender_type: SenderType, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            kind: MessageKind::Chat,
            content: content.into(),
            meta: MessageMeta {
                timestamp: Utc::now(),
                sender_type,
                session: None,
            },
        }
    }

    pub fn join(sender_id: impl Into<String>, sender_type: SenderType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            kind: MessageKind::Join,
            content: String::new(),
            meta: MessageMeta {
                timestamp: Utc::now(),
                sender_type,
                session: None,
            },
        }
    }

    /// Session-assignment control frame (also used for full resets).
    pub fn session_control(session: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: "channel".to_string(),
            kind: MessageKind::System,
            content: String::new(),
            meta: MessageMeta {
                timestamp: Utc::now(),
                sender_type: SenderType::System,
                session: Some(session.into()),
            },
        }
    }

    pub fn is_from_agent(&self) -> bool {
        self.meta.sender_type == SenderType::Agent
    }
}

/// A recorded utterance in the conversation log. Immutable once written;
/// ordering within a conversation is the store's acceptance order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Utterance {
    pub speaker_id: ParticipantId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One speaker-labeled line of a digest transcript.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscriptLine {
    pub speaker: String,
    pub content: String,
}

/// The bounded, per-decision rendering of transcript + summary + relationship
/// narrative. Rebuilt for every incoming message; never persisted.
#[derive(Clone, Debug)]
pub struct ContextDigest {
    pub transcript: Vec<TranscriptLine>,
    pub summary: Option<String>,
    pub relationship: Option<String>,
    pub perspective: ParticipantId,
}

impl ContextDigest {
    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty() && self.summary.is_none() && self.relationship.is_none()
    }

    /// Render the digest as prompt text. An empty digest renders an explicit
    /// placeholder so downstream prompts never see a bare empty string.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "(no prior context)".to_string();
        }
        let mut out = String::new();
        if let Some(ref summary) = self.summary {
            out.push_str("Conversation so far:\n");
            out.push_str(summary);
            out.push_str("\n\n");
        }
        if let Some(ref rel) = self.relationship {
            out.push_str("What you know about the speaker:\n");
            out.push_str(rel);
            out.push_str("\n\n");
        }
        if !self.transcript.is_empty() {
            out.push_str("Recent messages:\n");
            for line in &self.transcript {
                out.push_str(&format!("{}: {}\n", line.speaker, line.content));
            }
        }
        out.trim_end().to_string()
    }
}

/// The should-respond gate's output. Produced fresh per message, never cached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub should_respond: bool,
    pub reason: String,
    pub confidence: f32,
}

impl Decision {
    pub fn respond(reason: impl Into<String>, confidence: f32) -> Self {
        Self {
            should_respond: true,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn silent(reason: impl Into<String>, confidence: f32) -> Self {
        Self {
            should_respond: false,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// One tool-loop round's choice.
#[derive(Clone, Debug)]
pub struct ToolChoice {
    pub kind: ToolKind,
    pub reason: String,
    pub confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    RelationshipInsight,
    HistorySearch,
    RespondNow,
}

impl ToolKind {
    /// Parse the canonical kebab-case name. Unrecognized input is absence,
    /// not an error — the tool loop degrades to responding.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "relationship-insight" => Some(Self::RelationshipInsight),
            "history-search" => Some(Self::HistorySearch),
            "respond-now" => Some(Self::RespondNow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelationshipInsight => "relationship-insight",
            Self::HistorySearch => "history-search",
            Self::RespondNow => "respond-now",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
