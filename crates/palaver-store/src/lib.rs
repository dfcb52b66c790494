//! Palaver store — client for the relationship/context store collaborator
//!
//! The store owns the conversation log and the accumulated relationship
//! history. Agents only consume it: record utterances, fetch bounded context
//! digests, ask relationship questions, and search within a conversation.

pub mod client;
pub mod http;

pub use client::{ContextStore, DigestPayload, DigestQuery, StoreError, StoreResult};
pub use http::HttpContextStore;
