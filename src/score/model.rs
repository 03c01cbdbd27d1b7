use std::sync::Arc;

use crate::error::ScoreError;
use crate::pitch::MAX_PITCH;
use crate::score::types::{Score, ScoreNote, WorkingNote};

/// How far (seconds) a note may ring past the score's total duration.
pub const TRAILING_GRACE: f64 = 1.0;

/// A validated, immutable score template.
///
/// Cloning is cheap: every clone shares the same template. Runs never touch
/// the template; they work on the copy returned by `snapshot_for_run`.
#[derive(Clone, Debug)]
pub struct ScoreModel {
    template: Arc<Score>,
}

impl ScoreModel {
    /// Sorts the notes by onset (stable, so ties keep insertion order) and
    /// validates them. Nothing is kept if any check fails.
    pub fn load(mut score: Score) -> Result<Self, ScoreError> {
        for (index, note) in score.notes.iter_mut().enumerate() {
            if note.id.is_empty() {
                note.id = (index + 1).to_string();
            }
        }
        score.notes.sort_by(|a, b| {
            a.onset
                .partial_cmp(&b.onset)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        validate(&score)?;
        log::debug!(
            "Loaded score '{}' ({} notes, {:.2}s)",
            score.title,
            score.notes.len(),
            score.total_duration
        );
        Ok(ScoreModel {
            template: Arc::new(score),
        })
    }

    pub fn template(&self) -> &Score {
        &self.template
    }

    pub fn title(&self) -> &str {
        &self.template.title
    }

    pub fn total_duration(&self) -> f64 {
        self.template.total_duration
    }

    pub fn len(&self) -> usize {
        self.template.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.template.notes.is_empty()
    }

    /// Fresh working copy with every `played` flag cleared.
    pub fn snapshot_for_run(&self) -> Vec<WorkingNote> {
        self.template.notes.iter().map(WorkingNote::from).collect()
    }
}

fn validate(score: &Score) -> Result<(), ScoreError> {
    if !score.total_duration.is_finite() || score.total_duration < 0.0 {
        return Err(ScoreError::InvalidTotalDuration(score.total_duration));
    }
    let limit = score.total_duration + TRAILING_GRACE;

    for (index, note) in score.notes.iter().enumerate() {
        validate_note(index, note, limit)?;
    }
    Ok(())
}

fn validate_note(index: usize, note: &ScoreNote, limit: f64) -> Result<(), ScoreError> {
    let id = || note.id.clone();
    if !note.onset.is_finite() || note.onset < 0.0 {
        return Err(ScoreError::NegativeOnset {
            index,
            id: id(),
            onset: note.onset,
        });
    }
    if !note.duration.is_finite() || note.duration <= 0.0 {
        return Err(ScoreError::NonPositiveDuration {
            index,
            id: id(),
            duration: note.duration,
        });
    }
    if note.pitch > MAX_PITCH {
        return Err(ScoreError::PitchOutOfRange {
            index,
            id: id(),
            pitch: note.pitch,
        });
    }
    if !(0.0..=1.0).contains(&note.velocity) {
        return Err(ScoreError::VelocityOutOfRange {
            index,
            id: id(),
            velocity: note.velocity,
        });
    }
    // Tolerate float noise from beat-to-second conversion.
    if note.end() > limit + 1e-9 {
        return Err(ScoreError::NoteOverrunsScore {
            index,
            id: id(),
            end: note.end(),
            limit,
        });
    }
    Ok(())
}
