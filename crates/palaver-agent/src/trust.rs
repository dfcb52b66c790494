//! Relationship trust tracking — a bounded per-counterpart affinity score
//!
//! Advisory flavor input for prompt tone. It never gates a decision.

use serde::{Deserialize, Serialize};

pub const TRUST_MIN: i32 = -100;
pub const TRUST_MAX: i32 = 100;

/// Lexical marker tables feeding the clamped accumulator.
///
/// The tables are data, not code: configs can replace them wholesale. The
/// built-in defaults are intentionally small — the mechanism is the contract,
/// the word lists are tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrustLexicon {
    /// Markers of gratitude, respect, or displayed competence. (marker, delta>0)
    pub positive: Vec<(String, i32)>,
    /// Markers of hostility, demand, or submission. (marker, delta>0, subtracted)
    pub negative: Vec<(String, i32)>,
}

impl Default for TrustLexicon {
    fn default() -> Self {
        Self {
            positive: vec![
                ("thank".into(), 4),
                ("appreciate".into(), 4),
                ("well done".into(), 3),
                ("respect".into(), 3),
                ("impressive".into(), 3),
                ("good point".into(), 2),
            ],
            negative: vec![
                ("shut up".into(), 6),
                ("stupid".into(), 5),
                ("useless".into(), 5),
                ("hate".into(), 4),
                ("give me".into(), 2),
                ("beg".into(), 2),
                ("please don't hurt".into(), 3),
            ],
        }
    }
}

impl TrustLexicon {
    /// Net delta for one completed exchange. Both sides of the exchange are
    /// scanned: what the counterpart said, and what this agent said back.
    pub fn delta(&self, inbound: &str, outbound: &str) -> i32 {
        let inbound = inbound.to_lowercase();
        let outbound = outbound.to_lowercase();
        let mut delta = 0;
        for (marker, d) in &self.positive {
            if inbound.contains(marker.as_str()) {
                delta += d;
            }
        }
        for (marker, d) in &self.negative {
            if inbound.contains(marker.as_str()) {
                delta -= d;
            }
        }
        // The agent souring its own tone counts against the relationship too,
        // at half weight.
        for (marker, d) in &self.negative {
            if outbound.contains(marker.as_str()) {
                delta -= d / 2;
            }
        }
        delta
    }

    /// Pure score update: apply the exchange's delta and clamp.
    pub fn apply(&self, current: i32, inbound: &str, outbound: &str) -> i32 {
        clamp(current + self.delta(inbound, outbound))
    }
}

/// Clamp a raw score into the trust range.
pub fn clamp(score: i32) -> i32 {
    score.clamp(TRUST_MIN, TRUST_MAX)
}

/// Human-readable disposition bucket for prompt tone.
pub fn disposition(score: i32) -> &'static str {
    match score {
        s if s >= 50 => "warm and trusting",
        s if s >= 15 => "friendly",
        s if s > -15 => "neutral",
        s if s > -50 => "wary",
        _ => "openly hostile",
    }
}
