//! Generation request types

use serde::{Deserialize, Serialize};

/// One turn of a generation conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A generation request.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            messages: Vec::new(),
            system: None,
            max_tokens: Some(1024),
            temperature: None,
        }
    }
}

impl GenerationRequest {
    /// Single user-turn request — the common case for decision prompts.
    pub fn single(system: Option<String>, user: impl Into<String>) -> Self {
        Self {
            system,
            messages: vec![ChatTurn::user(user)],
            ..Default::default()
        }
    }
}
