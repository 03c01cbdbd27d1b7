use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Timing constants of the matching engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Look-ahead tolerance (seconds) that pulls near-simultaneous chord
    /// notes into the current due window.
    pub due_epsilon: f64,
    /// Upper bound (seconds) for a single tick's delta.
    pub max_delta: f64,
    /// Trailing time (seconds) after the score's total duration before the
    /// run finishes.
    pub completion_grace: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            due_epsilon: 0.05,
            max_delta: 0.1,
            completion_grace: 1.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainerConfig {
    pub engine: EngineConfig,
    /// Interval between periodic log batches while playing.
    pub sync_interval_ms: f64,
    /// Seconds of upcoming notes included in a render frame.
    pub look_ahead: f64,
    /// Seconds of past notes kept in a render frame.
    pub look_behind: f64,
    /// Velocity reported for notes struck on the computer keyboard.
    pub keyboard_velocity: f32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            engine: EngineConfig::default(),
            sync_interval_ms: 30_000.0,
            look_ahead: 4.0,
            look_behind: 1.0,
            keyboard_velocity: 0.7,
        }
    }
}

impl TrainerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
