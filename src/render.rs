use serde::Serialize;

use crate::engine::{MatchingEngine, Snapshot};
use crate::pitch::{is_black_key, midi_to_name};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    Played,
    /// Due and holding the clock.
    Waiting,
    Upcoming,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FallingNote {
    pub id: String,
    pub pitch: u8,
    pub label: String,
    pub is_black: bool,
    pub onset: f64,
    pub duration: f64,
    /// Seconds from the playhead to the note's onset; negative once passed.
    pub time_until: f64,
    pub status: NoteStatus,
}

/// Everything the presentation layer draws for one frame.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub snapshot: Snapshot,
    pub title: String,
    pub author: String,
    pub notes: Vec<FallingNote>,
}

/// Collects the notes overlapping `[clock - look_behind, clock + look_ahead]`.
pub fn frame(engine: &MatchingEngine, look_ahead: f64, look_behind: f64) -> Frame {
    let snapshot = engine.snapshot();
    let clock = snapshot.clock;
    let due_horizon = clock + engine.config().due_epsilon;
    let (from, to) = (clock - look_behind, clock + look_ahead);

    let notes = engine
        .notes()
        .iter()
        .filter(|n| n.note.end() >= from && n.note.onset <= to)
        .map(|n| {
            let status = if n.played {
                NoteStatus::Played
            } else if snapshot.waiting && n.note.onset <= due_horizon {
                NoteStatus::Waiting
            } else {
                NoteStatus::Upcoming
            };
            FallingNote {
                id: n.note.id.clone(),
                pitch: n.note.pitch,
                label: midi_to_name(n.note.pitch),
                is_black: is_black_key(n.note.pitch),
                onset: n.note.onset,
                duration: n.note.duration,
                time_until: n.note.onset - clock,
                status,
            }
        })
        .collect();

    let template = engine.score().template();
    Frame {
        snapshot,
        title: template.title.clone(),
        author: template.author.clone(),
        notes,
    }
}
