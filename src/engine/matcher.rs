use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::engine::types::{GameState, Snapshot, Tick};
use crate::engine::wall_clock_ms;
use crate::input::HeldNotes;
use crate::score::{ScoreModel, WorkingNote};
use crate::scoring::types::LogEntry;

/// Playhead and note matcher for one score.
///
/// The clock only moves while every due note (onset <= clock + epsilon) has
/// been played. Each note is matched at most once per run; the working copy
/// of the score is rebuilt from the template on every start and reset.
pub struct MatchingEngine {
    config: EngineConfig,
    score: ScoreModel,
    notes: Vec<WorkingNote>,
    state: GameState,
    clock: f64,
    /// Index of the first note not yet played. Only moves forward.
    next_unresolved: usize,
    awaited: Vec<u8>,
    /// Note index -> wall-clock ms at which the engine began waiting on it.
    wait_started_ms: BTreeMap<usize, f64>,
    run_started_ms: Option<f64>,
    completion_signalled: bool,
    now_ms: fn() -> f64,
}

impl MatchingEngine {
    pub fn new(score: ScoreModel, config: EngineConfig) -> Self {
        let notes = score.snapshot_for_run();
        MatchingEngine {
            config,
            score,
            notes,
            state: GameState::Idle,
            clock: 0.0,
            next_unresolved: 0,
            awaited: Vec::new(),
            wait_started_ms: BTreeMap::new(),
            run_started_ms: None,
            completion_signalled: false,
            now_ms: wall_clock_ms,
        }
    }

    /// Replaces the wall clock used for log timestamps.
    pub fn with_wall_clock(mut self, now_ms: fn() -> f64) -> Self {
        self.now_ms = now_ms;
        self
    }

    /// Swaps the active score. Any run in progress is abandoned first.
    pub fn load_score(&mut self, score: ScoreModel) {
        if self.state != GameState::Idle {
            self.reset();
        }
        self.score = score;
        self.clear_run();
        log::info!("Score '{}' ready ({} notes)", self.score.title(), self.score.len());
    }

    /// Begins a fresh run from the top. Returns the run-start timestamp.
    pub fn start(&mut self) -> f64 {
        self.clear_run();
        let now = (self.now_ms)();
        self.run_started_ms = Some(now);
        self.state = GameState::Playing;
        log::info!("Run started on '{}'", self.score.title());
        now
    }

    pub fn pause(&mut self) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        self.state = GameState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != GameState::Paused {
            return false;
        }
        self.state = GameState::Playing;
        true
    }

    /// Back to IDLE with every per-run value cleared.
    pub fn reset(&mut self) {
        if self.state != GameState::Idle {
            log::info!("Run on '{}' reset at {:.2}s", self.score.title(), self.clock);
        }
        self.clear_run();
        self.run_started_ms = None;
        self.state = GameState::Idle;
    }

    fn clear_run(&mut self) {
        self.notes = self.score.snapshot_for_run();
        self.clock = 0.0;
        self.next_unresolved = 0;
        self.awaited.clear();
        self.wait_started_ms.clear();
        self.completion_signalled = false;
    }

    /// Advances the run by one frame.
    ///
    /// `delta` is the real time since the previous tick in seconds; it is
    /// clamped to `[0, max_delta]`. `held` is read once, as-is. Outside the
    /// PLAYING state nothing changes.
    pub fn tick(&mut self, delta: f64, held: &HeldNotes) -> Tick {
        if self.state != GameState::Playing {
            return Tick {
                snapshot: self.snapshot(),
                matched: Vec::new(),
                completed: false,
            };
        }

        let delta = if delta.is_finite() {
            delta.clamp(0.0, self.config.max_delta)
        } else {
            0.0
        };
        let now = (self.now_ms)();
        let horizon = self.clock + self.config.due_epsilon;

        let mut matched = Vec::new();
        let mut resolved_this_pass: u128 = 0;
        self.awaited.clear();

        let first = self.next_unresolved;
        for (offset, note) in self.notes[first..].iter_mut().enumerate() {
            if note.note.onset > horizon {
                break;
            }
            if note.played {
                continue;
            }
            let pitch = note.note.pitch;
            let bit = 1u128 << pitch;
            if held.contains(pitch) && resolved_this_pass & bit == 0 {
                resolved_this_pass |= bit;
                note.played = true;
                // Held before it fell due: zero, or negative inside the
                // early tolerance window.
                let time_gap = match self.wait_started_ms.remove(&(first + offset)) {
                    Some(since) => now - since,
                    None => ((self.clock - note.note.onset) * 1000.0).min(0.0),
                };
                matched.push(LogEntry {
                    timestamp: now,
                    pitch,
                    expected_pitch: Some(pitch),
                    is_correct: true,
                    velocity: held.velocity(pitch).map(f64::from),
                    time_gap: Some(time_gap),
                });
            } else {
                self.awaited.push(pitch);
                self.wait_started_ms.entry(first + offset).or_insert(now);
            }
        }

        while self
            .notes
            .get(self.next_unresolved)
            .is_some_and(|n| n.played)
        {
            self.next_unresolved += 1;
        }

        if self.awaited.is_empty() {
            self.clock += delta;
        } else {
            self.awaited.sort_unstable();
            self.awaited.dedup();
        }

        let mut completed = false;
        if !self.completion_signalled
            && self.clock > self.score.total_duration() + self.config.completion_grace
        {
            self.completion_signalled = true;
            self.state = GameState::Finished;
            completed = true;
            log::info!(
                "Run on '{}' finished at {:.2}s",
                self.score.title(),
                self.clock
            );
        }

        Tick {
            snapshot: self.snapshot(),
            matched,
            completed,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let total = self.score.total_duration();
        let progress = if total > 0.0 {
            (self.clock / total).clamp(0.0, 1.0)
        } else if self.state == GameState::Finished {
            1.0
        } else {
            0.0
        };
        Snapshot {
            state: self.state,
            clock: self.clock,
            waiting: !self.awaited.is_empty(),
            awaited_pitches: self.awaited.clone(),
            progress,
            played_notes: self.notes.iter().filter(|n| n.played).count(),
            total_notes: self.notes.len(),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn is_waiting(&self) -> bool {
        !self.awaited.is_empty()
    }

    pub fn notes(&self) -> &[WorkingNote] {
        &self.notes
    }

    pub fn score(&self) -> &ScoreModel {
        &self.score
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run_started_ms(&self) -> Option<f64> {
        self.run_started_ms
    }
}
