//! Palaver LLM — generation backend trait and Anthropic provider

pub mod anthropic;
pub mod backend;
pub mod extract;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use backend::{GenerationBackend, LlmError, LlmResult};
pub use extract::extract_json;
pub use types::{ChatTurn, GenerationRequest};
