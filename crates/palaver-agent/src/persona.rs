//! Personas — one pipeline, parameterized by a capability struct
//!
//! Archetype variation is composition, not a type hierarchy: every agent runs
//! the same concrete pipeline, configured by the fields below.

use crate::gate::GateStrategy;
use crate::trust::TrustLexicon;
use palaver_core::ParticipantId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Friendly,
    Suspicious,
    Hostile,
    Neutral,
    Narrator,
}

impl Archetype {
    pub fn initial_trust(&self) -> i32 {
        match self {
            Archetype::Friendly => 20,
            Archetype::Suspicious => -10,
            Archetype::Hostile => -40,
            Archetype::Neutral | Archetype::Narrator => 0,
        }
    }

    fn default_prompt(&self, display_name: &str) -> String {
        let flavor = match self {
            Archetype::Friendly => "You are good-natured and helpful, and you warm to people quickly.",
            Archetype::Suspicious => "You are guarded. You answer, but you weigh motives before trusting anyone.",
            Archetype::Hostile => "You are short-tempered and abrasive. You answer when addressed, grudgingly.",
            Archetype::Neutral => "You are even-keeled and matter-of-fact.",
            Archetype::Narrator => "You are the narrator. You describe scenes and events; you do not take sides.",
        };
        format!(
            "You are {}, one participant in a shared chat with several humans and agents. {} \
             Speak in first person, stay in character, and keep replies to a few sentences.",
            display_name, flavor
        )
    }
}

/// Everything that varies between agents. Fixed at construction; immutable for
/// the process lifetime.
#[derive(Clone, Debug)]
pub struct Persona {
    pub display_name: String,
    pub id: ParticipantId,
    pub archetype: Archetype,
    pub system_prompt: String,
    pub temperature: f32,
    pub response_max_tokens: u32,
    pub gate: GateStrategy,
    pub initial_trust: i32,
    pub lexicon: TrustLexicon,
    /// Narrator-only: emitted once per joining participant.
    pub scene_intro: Option<String>,
}

impl Persona {
    pub fn new(display_name: impl Into<String>, archetype: Archetype) -> Self {
        let display_name = display_name.into();
        let id = ParticipantId::normalize(&display_name);
        Self {
            system_prompt: archetype.default_prompt(&display_name),
            temperature: 0.7,
            response_max_tokens: 300,
            gate: match archetype {
                Archetype::Narrator => GateStrategy::Heuristic,
                _ => GateStrategy::Backed,
            },
            initial_trust: archetype.initial_trust(),
            lexicon: TrustLexicon::default(),
            scene_intro: None,
            display_name,
            id,
            archetype,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_gate(mut self, gate: GateStrategy) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_scene_intro(mut self, intro: impl Into<String>) -> Self {
        self.scene_intro = Some(intro.into());
        self
    }

    /// Character-style agents track trust; the narrator does not.
    pub fn tracks_trust(&self) -> bool {
        self.archetype != Archetype::Narrator
    }
}
