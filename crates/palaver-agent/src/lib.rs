//! Palaver agent — the per-message decision pipeline and runtime glue
//!
//! One inbound chat message flows: intake filters → context assembly →
//! should-respond gate → bounded tool loop → response emission → trust
//! update. Every external dependency is behind a trait and a timeout; the
//! worst outcome for any single message is that the agent stays silent.

pub mod channel;
pub mod config;
pub mod context;
pub mod emitter;
pub mod gate;
pub mod persona;
pub mod planner;
pub mod runtime;
pub mod toolbox;
pub mod trust;

pub use channel::ChannelClient;
pub use config::PalaverConfig;
pub use context::ContextAssembler;
pub use emitter::ResponseEmitter;
pub use gate::{GateStrategy, ResponseGate};
pub use persona::{Archetype, Persona};
pub use planner::{ResponsePlanner, ToolTracker, MAX_TOOL_ROUNDS};
pub use runtime::{AgentRuntime, PipelineSettings};
pub use toolbox::Toolbox;
pub use trust::{TrustLexicon, TRUST_MAX, TRUST_MIN};
