//! Channel wire protocol — JSON text frames over WebSocket
//!
//! Wire format (both directions are `ChannelMessage` JSON):
//!
//! Chat frame:
//!   { "id": "...", "sender_id": "alice", "kind": "chat", "content": "hi all",
//!     "meta": { "timestamp": "...", "sender_type": "human" } }
//!
//! Session assignment / reset (server → client, pushed after connect and on
//! operator restart):
//!   { "id": "...", "sender_id": "channel", "kind": "system", "content": "",
//!     "meta": { "timestamp": "...", "sender_type": "system", "session": "conv-7" } }
//!
//! Agents ignore their own `chat` frames and all `leave` frames for decision
//! purposes. `join` frames only matter to narrator personas (one scene
//! introduction per join). A `system` frame whose `meta.session` differs from
//! the currently held reference is a full session reset: the agent swaps its
//! reference and clears all derived local state exactly once.

use crate::types::ChannelMessage;
use crate::{Error, Result};

/// Decode one inbound text frame.
pub fn decode_frame(text: &str) -> Result<ChannelMessage> {
    serde_json::from_str(text).map_err(|e| Error::invalid_message(format!("bad frame: {}", e)))
}

/// Encode an outbound message as a text frame.
pub fn encode_frame(message: &ChannelMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Extract the session reference pushed by a control frame, if any.
pub fn session_push(message: &ChannelMessage) -> Option<&str> {
    match message.kind {
        crate::MessageKind::System => message.meta.session.as_deref(),
        _ => None,
    }
}
