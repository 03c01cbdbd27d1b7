use serde::Serialize;

use crate::scoring::types::LogEntry;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[default]
    Idle,
    Playing,
    Paused,
    Finished,
}

/// Engine state as seen by the render layer after a tick.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub state: GameState,
    /// Performance clock, seconds.
    pub clock: f64,
    /// True while the clock is held back by unplayed due notes.
    pub waiting: bool,
    /// Pitches the engine is waiting for, ascending, without repeats.
    pub awaited_pitches: Vec<u8>,
    /// Fraction of the score covered, 0-1.
    pub progress: f64,
    pub played_notes: usize,
    pub total_notes: usize,
}

/// Result of one engine tick.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub snapshot: Snapshot,
    /// Entries produced by this tick, in score order.
    pub matched: Vec<LogEntry>,
    /// Set on exactly one tick per run: the one that finished it.
    pub completed: bool,
}
