//! Palaver core — shared types, participant identity, and the wire protocol

pub mod error;
pub mod protocol;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
