//! Error types for the practice core.
//!
//! `ScoreError` carries the detail of a rejected score. `TrainerError` is the
//! crate-level taxonomy. Persistence and coaching failures never reach the
//! frame loop: they are logged where they happen and a fallback is used.

use thiserror::Error;

/// Why a score was rejected by `ScoreModel::load`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("note {index} ({id}): onset {onset} must be a finite value >= 0")]
    NegativeOnset { index: usize, id: String, onset: f64 },

    #[error("note {index} ({id}): duration {duration} must be a finite value > 0")]
    NonPositiveDuration {
        index: usize,
        id: String,
        duration: f64,
    },

    #[error("note {index} ({id}): pitch {pitch} is outside the MIDI range 0-127")]
    PitchOutOfRange { index: usize, id: String, pitch: u8 },

    #[error("note {index} ({id}): velocity {velocity} is outside 0-1")]
    VelocityOutOfRange {
        index: usize,
        id: String,
        velocity: f64,
    },

    #[error("total duration {0} must be a finite value >= 0")]
    InvalidTotalDuration(f64),

    #[error("note {index} ({id}) ends at {end}s, past the {limit}s allowed for this score")]
    NoteOverrunsScore {
        index: usize,
        id: String,
        end: f64,
        limit: f64,
    },
}

#[derive(Error, Debug)]
pub enum TrainerError {
    /// Malformed score data. Fatal to `load`; nothing is applied.
    #[error("Invalid score: {0}")]
    InvalidScore(#[from] ScoreError),

    /// MusicXML import failed before a score could be built.
    #[error("MusicXML error: {0}")]
    MusicXml(String),

    /// An input edge named a source that is not (or no longer) registered.
    #[error("Input source unavailable: {0}")]
    InputSourceUnavailable(String),

    /// The session/stats service rejected or never received a request.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The coaching service failed or answered with something unusable.
    #[error("Coaching unavailable: {0}")]
    CoachingUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
