//! One practice session: the engine, its inputs, the run log and the
//! persistence handle, driven one tick at a time by the host's frame loop.

use crate::config::TrainerConfig;
use crate::engine::{wall_clock_ms, GameState, MatchingEngine, Snapshot, Tick};
use crate::error::{Result, TrainerError};
use crate::input::{midi, InputAggregator, InputEdge, KeyboardPiano, SourceId, SourceKind};
use crate::render::{self, Frame};
use crate::score::ScoreModel;
use crate::scoring::{LogEntry, SessionLog, SessionRecord, Stats};
use crate::services::{
    request_exercise, request_insights, CoachInsight, CoachingService, SessionStore, UserStats,
};

pub struct PracticeSession {
    config: TrainerConfig,
    engine: MatchingEngine,
    input: InputAggregator,
    keyboard: KeyboardPiano,
    keyboard_source: SourceId,
    log: SessionLog,
    store: Option<Box<dyn SessionStore>>,
    user_id: Option<String>,
    run_id: Option<String>,
    runs_started: u32,
    last_session_id: Option<String>,
    now_ms: fn() -> f64,
}

impl PracticeSession {
    pub fn new(score: ScoreModel, config: TrainerConfig) -> Self {
        let mut input = InputAggregator::new();
        let keyboard_source = input.register(SourceKind::Keyboard, "Computer keyboard");
        PracticeSession {
            engine: MatchingEngine::new(score, config.engine.clone()),
            input,
            keyboard: KeyboardPiano::new(config.keyboard_velocity),
            keyboard_source,
            log: SessionLog::new(config.sync_interval_ms),
            store: None,
            user_id: None,
            run_id: None,
            runs_started: 0,
            last_session_id: None,
            now_ms: wall_clock_ms,
            config,
        }
    }

    /// Replaces the wall clock for the engine and the sync timer alike.
    pub fn with_wall_clock(mut self, now_ms: fn() -> f64) -> Self {
        self.now_ms = now_ms;
        self.engine = self.engine.with_wall_clock(now_ms);
        self
    }

    pub fn set_store(&mut self, store: Box<dyn SessionStore>) {
        self.store = Some(store);
    }

    pub fn clear_store(&mut self) {
        self.store = None;
    }

    /// Runs are only persisted while a user is signed in.
    pub fn sign_in(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    pub fn sign_out(&mut self) {
        self.user_id = None;
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    // Lifecycle

    /// Swaps the active score. A run in progress is torn down first.
    pub fn load_score(&mut self, score: ScoreModel) {
        self.teardown();
        self.engine.load_score(score);
    }

    /// Starts a fresh run and returns its identifier.
    pub fn start(&mut self) -> String {
        if let Some(previous) = self.run_id.as_deref() {
            if self.engine.state() != GameState::Finished {
                log::debug!(
                    "Run {} superseded; {} unsent log entries dropped",
                    previous,
                    self.log.unsynced().len()
                );
            }
        }
        let started_ms = self.engine.start();
        self.runs_started += 1;
        let run_id = format!("run-{}-{}", started_ms.max(0.0) as u64, self.runs_started);
        self.log.begin_run(started_ms);
        self.last_session_id = None;
        self.run_id = Some(run_id.clone());
        run_id
    }

    pub fn pause(&mut self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.engine.resume()
    }

    /// Back to IDLE. Every input source is released and the run log
    /// discarded without being sent.
    pub fn reset(&mut self) {
        self.teardown();
        self.engine.reset();
    }

    fn teardown(&mut self) {
        self.input.release_everything();
        self.keyboard.blur();
        self.log.clear();
        self.run_id = None;
    }

    // Input

    pub fn add_source(&mut self, kind: SourceKind, name: impl Into<String>) -> SourceId {
        self.input.register(kind, name)
    }

    pub fn remove_source(&mut self, id: SourceId) -> bool {
        if id == self.keyboard_source {
            return false;
        }
        self.input.unregister(id)
    }

    pub fn keyboard_source(&self) -> SourceId {
        self.keyboard_source
    }

    /// Feeds a raw MIDI message from `source`. Messages that are not note
    /// events are ignored.
    pub fn midi_message(&mut self, source: SourceId, bytes: &[u8]) -> Result<()> {
        match midi::decode(bytes) {
            Some(edge) => self.input.apply(source, edge),
            None => Ok(()),
        }
    }

    pub fn apply(&mut self, source: SourceId, edge: InputEdge) -> Result<()> {
        self.input.apply(source, edge)
    }

    /// Returns false for keys outside the keyboard map.
    pub fn key_down(&mut self, key: &str) -> bool {
        if crate::input::keyboard::pitch_for_key(key).is_none() {
            return false;
        }
        if let Some(edge) = self.keyboard.key_down(key) {
            self.apply_keyboard(edge);
        }
        true
    }

    pub fn key_up(&mut self, key: &str) -> bool {
        match self.keyboard.key_up(key) {
            Some(edge) => {
                self.apply_keyboard(edge);
                true
            }
            None => false,
        }
    }

    pub fn blur(&mut self) {
        let edge = self.keyboard.blur();
        self.apply_keyboard(edge);
    }

    fn apply_keyboard(&mut self, edge: InputEdge) {
        // The keyboard source is registered in `new` and never removed.
        if let Err(e) = self.input.apply(self.keyboard_source, edge) {
            log::warn!("Keyboard input dropped: {}", e);
        }
    }

    // Frame loop

    /// Advances the active run by `delta` seconds against the currently held
    /// pitches, records the matches and drives persistence.
    pub fn tick(&mut self, delta: f64) -> Tick {
        let held = self.input.snapshot();
        let tick = self.engine.tick(delta, &held);
        for entry in &tick.matched {
            self.log.record(entry.clone());
        }

        if tick.completed {
            self.finish_run();
        } else if self.engine.state() == GameState::Playing {
            self.sync_pending();
        }
        tick
    }

    fn sync_pending(&mut self) {
        let (Some(store), Some(run_id)) = (self.store.as_deref_mut(), self.run_id.as_deref()) else {
            return;
        };
        if self.user_id.is_none() {
            return;
        }
        self.log.poll_sync((self.now_ms)(), run_id, store);
    }

    fn finish_run(&mut self) {
        let stats = self.log.stats();
        log::info!(
            "Finished '{}': {}/{} correct ({}%)",
            self.engine.score().title(),
            stats.correct_notes,
            stats.total_notes,
            stats.accuracy
        );

        let (Some(store), Some(user_id)) = (self.store.as_deref_mut(), self.user_id.as_ref()) else {
            log::debug!("No signed-in user; run not saved");
            self.log.discard_unsynced();
            return;
        };
        let end_time = (self.now_ms)();
        let record = SessionRecord {
            user_id: user_id.clone(),
            start_time: self.engine.run_started_ms().unwrap_or(end_time),
            end_time,
            song_title: self.engine.score().title().to_string(),
            accuracy: stats.accuracy,
            total_notes: stats.total_notes,
            average_velocity: stats.average_velocity,
        };
        self.last_session_id = self.log.flush_completed(&record, store);
    }

    // Views

    pub fn snapshot(&self) -> Snapshot {
        self.engine.snapshot()
    }

    pub fn frame(&self) -> Frame {
        render::frame(&self.engine, self.config.look_ahead, self.config.look_behind)
    }

    pub fn stats(&self) -> Stats {
        self.log.stats()
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn held_pitches(&self) -> Vec<u8> {
        self.input.snapshot().pitches().collect()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Id the store assigned to the last completed run, if it was saved.
    pub fn last_session_id(&self) -> Option<&str> {
        self.last_session_id.as_deref()
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    // Services

    pub fn user_stats(&mut self) -> Result<UserStats> {
        let user_id = self
            .user_id
            .as_deref()
            .ok_or_else(|| TrainerError::PersistenceUnavailable("no signed-in user".to_string()))?;
        let store = self
            .store
            .as_deref_mut()
            .ok_or_else(|| TrainerError::PersistenceUnavailable("no session store".to_string()))?;
        store.user_stats(user_id)
    }

    /// Coaching feedback on the current run log.
    pub fn insights(&self, coach: &mut dyn CoachingService) -> CoachInsight {
        request_insights(coach, self.log.entries())
    }

    /// Builds a remedial exercise from the user's trouble notes. The result
    /// is always loadable; it is not made active.
    pub fn remedial_exercise(&mut self, coach: &mut dyn CoachingService) -> ScoreModel {
        let trouble = match self.user_stats() {
            Ok(stats) => stats.trouble_pitches(crate::exercises::MAX_DRILL_PITCHES),
            Err(e) => {
                log::warn!("Trouble notes unavailable: {}", e);
                Vec::new()
            }
        };
        request_exercise(coach, &trouble)
    }
}
