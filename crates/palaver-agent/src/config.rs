//! Palaver configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup, falls
//! back to defaults if no config file exists.

use crate::gate::GateStrategy;
use crate::persona::{Archetype, Persona};
use crate::runtime::PipelineSettings;
use crate::trust::TrustLexicon;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PalaverConfig {
    pub channel: ChannelConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub agents: Vec<AgentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// WebSocket URL of the shared chat channel.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the relationship/context store.
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transcript budget for context digests, in tokens.
    pub token_budget: usize,
    pub max_tool_rounds: usize,
    /// Minimum seconds between replies to other agents.
    pub agent_cooldown_secs: u64,
    pub dedup_capacity: usize,
}

/// One agent to spawn. Only `name` and `archetype` are required; everything
/// else falls back to the archetype preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub archetype: Archetype,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub gate: Option<GateStrategy>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub scene_intro: Option<String>,
    #[serde(default)]
    pub lexicon: Option<TrustLexicon>,
}

impl AgentEntry {
    pub fn to_persona(&self) -> Persona {
        let mut persona = Persona::new(&self.name, self.archetype);
        if let Some(ref prompt) = self.system_prompt {
            persona.system_prompt = prompt.clone();
        }
        if let Some(gate) = self.gate {
            persona.gate = gate;
        }
        if let Some(temperature) = self.temperature {
            persona.temperature = temperature;
        }
        if let Some(ref intro) = self.scene_intro {
            persona.scene_intro = Some(intro.clone());
        }
        if let Some(ref lexicon) = self.lexicon {
            persona.lexicon = lexicon.clone();
        }
        persona
    }
}

// ============================================================
// Defaults
// ============================================================

impl Default for PalaverConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            store: StoreConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            agents: vec![
                AgentEntry {
                    name: "Stack".into(),
                    archetype: Archetype::Friendly,
                    system_prompt: None,
                    gate: None,
                    temperature: None,
                    scene_intro: None,
                    lexicon: None,
                },
                AgentEntry {
                    name: "Grimjaw".into(),
                    archetype: Archetype::Hostile,
                    system_prompt: None,
                    gate: None,
                    temperature: None,
                    scene_intro: None,
                    lexicon: None,
                },
            ],
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9402/ws".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9401".into(),
            timeout_secs: 10,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_budget: 2048,
            max_tool_rounds: 3,
            agent_cooldown_secs: 20,
            dedup_capacity: 128,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl PalaverConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model: self.llm.model.clone(),
            token_budget: self.pipeline.token_budget,
            max_tool_rounds: self.pipeline.max_tool_rounds,
            agent_cooldown: Duration::from_secs(self.pipeline.agent_cooldown_secs),
            dedup_capacity: self.pipeline.dedup_capacity,
            store_timeout: Duration::from_secs(self.store.timeout_secs),
            llm_timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}
