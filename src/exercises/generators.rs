use crate::pitch::{midi_to_name, MAX_PITCH};
use crate::score::{Score, ScoreModel, ScoreNote};

/// Most trouble pitches a single drill covers.
pub const MAX_DRILL_PITCHES: usize = 5;

/// Pitches drilled when the player has no recorded trouble notes.
pub const DEFAULT_TROUBLE_PITCHES: [u8; 3] = [60, 62, 64];

const DRILL_VELOCITY: f64 = 0.6;

/// Static exercise used whenever a generated one is unavailable.
pub fn fallback_exercise() -> Score {
    Score {
        title: "C Major Scale (Fallback)".to_string(),
        author: "System".to_string(),
        total_duration: 5.0,
        notes: vec![
            ScoreNote::new("1", 60, 0.0, 0.5, DRILL_VELOCITY),
            ScoreNote::new("2", 62, 0.5, 0.5, DRILL_VELOCITY),
            ScoreNote::new("3", 64, 1.0, 0.5, DRILL_VELOCITY),
        ],
    }
}

/// `fallback_exercise`, already validated.
pub fn fallback_model() -> ScoreModel {
    match ScoreModel::load(fallback_exercise()) {
        Ok(model) => model,
        // The fallback is a constant; a failure here is a programming error.
        Err(e) => unreachable!("fallback exercise is invalid: {}", e),
    }
}

struct DrillBuilder {
    notes: Vec<ScoreNote>,
    beat: f64,
    seconds_per_beat: f64,
}

impl DrillBuilder {
    fn new(tempo: f64) -> Self {
        let tempo = if tempo.is_finite() && tempo > 0.0 { tempo } else { 80.0 };
        DrillBuilder {
            notes: Vec::new(),
            beat: 0.0,
            seconds_per_beat: 60.0 / tempo,
        }
    }

    fn push(&mut self, pitch: u8, beats: f64) {
        self.chord(&[pitch], beats);
    }

    fn chord(&mut self, pitches: &[u8], beats: f64) {
        let onset = self.beat * self.seconds_per_beat;
        let duration = beats * self.seconds_per_beat;
        for &pitch in pitches {
            let id = (self.notes.len() + 1).to_string();
            self.notes
                .push(ScoreNote::new(id, pitch, onset, duration, DRILL_VELOCITY));
        }
        self.beat += beats;
    }

    fn rest(&mut self, beats: f64) {
        self.beat += beats;
    }

    fn build(self, title: String) -> Score {
        let total_duration = self
            .notes
            .iter()
            .map(ScoreNote::end)
            .fold(0.0_f64, f64::max);
        Score {
            title,
            author: "Practice Drill".to_string(),
            total_duration,
            notes: self.notes,
        }
    }
}

/// Local remedial drill for the given trouble pitches.
///
/// Each pitch gets a neighbour-note figure (below, target, above, target) in
/// quarter notes, then the target as a half note with the major third and
/// perfect fifth beneath it, then a beat of rest. Empty input drills the
/// default pitches.
pub fn trouble_drill(trouble_pitches: &[u8], tempo: f64) -> Score {
    let pitches: Vec<u8> = if trouble_pitches.is_empty() {
        DEFAULT_TROUBLE_PITCHES.to_vec()
    } else {
        trouble_pitches
            .iter()
            .copied()
            .filter(|p| *p <= MAX_PITCH)
            .take(MAX_DRILL_PITCHES)
            .collect()
    };

    let mut drill = DrillBuilder::new(tempo);
    for &target in &pitches {
        let below = target.saturating_sub(1);
        let above = target.saturating_add(1).min(MAX_PITCH);
        drill.push(below, 1.0);
        drill.push(target, 1.0);
        drill.push(above, 1.0);
        drill.push(target, 1.0);

        let mut voicing: Vec<u8> = [7u8, 4]
            .iter()
            .filter_map(|interval| target.checked_sub(*interval))
            .collect();
        voicing.push(target);
        drill.chord(&voicing, 2.0);
        drill.rest(1.0);
    }

    let names: Vec<String> = pitches.iter().map(|p| midi_to_name(*p)).collect();
    drill.build(format!("Trouble Notes: {}", names.join(", ")))
}
