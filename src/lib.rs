use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod config;
pub mod engine;
pub mod error;
pub mod exercises;
pub mod input;
pub mod parser;
pub mod pitch;
pub mod practice;
pub mod render;
pub mod score;
pub mod scoring;
pub mod services;

use config::TrainerConfig;
use error::TrainerError;
use input::{SourceId, SourceKind};
use practice::PracticeSession;
use score::{Score, ScoreModel};
use scoring::{LogEntry, SessionRecord};
use services::{HostReply, SessionStore, UserStats};

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn load_js_score(score_js: JsValue) -> Result<ScoreModel, JsValue> {
    let score: Score = from_js(score_js)?;
    ScoreModel::load(score).map_err(|e| JsValue::from_str(&TrainerError::from(e).to_string()))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Session store backed by three host callbacks:
/// `saveSession(summary, logs) -> sessionId`, `syncLogs(sessionId, logs)` and
/// `getUserStats(userId) -> stats`. A callback that throws is reported as
/// `PersistenceUnavailable`, and so is a `Promise` where a value is needed:
/// `syncLogs` may be async, the other two must answer synchronously.
struct JsSessionStore {
    save_session: js_sys::Function,
    sync_logs: js_sys::Function,
    user_stats: js_sys::Function,
}

fn unavailable(e: impl std::fmt::Display) -> TrainerError {
    TrainerError::PersistenceUnavailable(e.to_string())
}

fn reply(value: JsValue) -> HostReply<JsValue> {
    if value.is_instance_of::<js_sys::Promise>() {
        HostReply::Pending
    } else {
        HostReply::Ready(value)
    }
}

impl SessionStore for JsSessionStore {
    fn save_session(&mut self, session: &SessionRecord, logs: &[LogEntry]) -> error::Result<String> {
        let summary = serde_wasm_bindgen::to_value(session).map_err(unavailable)?;
        let logs = serde_wasm_bindgen::to_value(logs).map_err(unavailable)?;
        let value = self
            .save_session
            .call2(&JsValue::NULL, &summary, &logs)
            .map_err(|e| unavailable(describe(&e)))?;
        reply(value).map(|id| id.as_string()).session_id()
    }

    fn sync_logs(&mut self, session_id: &str, logs: &[LogEntry]) -> error::Result<()> {
        let logs = serde_wasm_bindgen::to_value(logs).map_err(unavailable)?;
        self.sync_logs
            .call2(&JsValue::NULL, &JsValue::from_str(session_id), &logs)
            .map_err(|e| unavailable(describe(&e)))?;
        Ok(())
    }

    fn user_stats(&mut self, user_id: &str) -> error::Result<UserStats> {
        let value = self
            .user_stats
            .call1(&JsValue::NULL, &JsValue::from_str(user_id))
            .map_err(|e| unavailable(describe(&e)))?;
        let value = reply(value).ready("getUserStats")?;
        // troubleNotes arrives as a plain object keyed by pitch strings.
        let json = js_sys::JSON::stringify(&value)
            .map_err(|e| unavailable(describe(&e)))?
            .as_string()
            .ok_or_else(|| unavailable("user stats are not serializable"))?;
        HostReply::Ready(json).user_stats()
    }
}

/// A practice session for the browser. The host calls `tick` from its
/// animation frame and forwards MIDI and keyboard events in between.
#[wasm_bindgen]
pub struct PianoTrainer {
    session: PracticeSession,
}

#[wasm_bindgen]
impl PianoTrainer {
    /// `config_js` may be `undefined` for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(score_js: JsValue, config_js: JsValue) -> Result<PianoTrainer, JsValue> {
        let config: TrainerConfig = if config_js.is_null() || config_js.is_undefined() {
            TrainerConfig::default()
        } else {
            from_js(config_js)?
        };
        let score = load_js_score(score_js)?;
        Ok(PianoTrainer {
            session: PracticeSession::new(score, config),
        })
    }

    pub fn load_score(&mut self, score_js: JsValue) -> Result<(), JsValue> {
        let score = load_js_score(score_js)?;
        self.session.load_score(score);
        Ok(())
    }

    pub fn load_musicxml(&mut self, xml: &str) -> Result<(), JsValue> {
        let score = parser::parse_musicxml(xml)
            .and_then(|score| ScoreModel::load(score).map_err(TrainerError::from))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.session.load_score(score);
        Ok(())
    }

    pub fn set_store(
        &mut self,
        save_session: js_sys::Function,
        sync_logs: js_sys::Function,
        user_stats: js_sys::Function,
    ) {
        self.session.set_store(Box::new(JsSessionStore {
            save_session,
            sync_logs,
            user_stats,
        }));
    }

    pub fn sign_in(&mut self, user_id: &str) {
        self.session.sign_in(user_id);
    }

    pub fn sign_out(&mut self) {
        self.session.sign_out();
    }

    /// Starts a fresh run; returns the run id.
    pub fn start(&mut self) -> String {
        self.session.start()
    }

    pub fn pause(&mut self) -> bool {
        self.session.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.session.resume()
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub fn add_midi_source(&mut self, name: &str) -> u32 {
        self.session.add_source(SourceKind::Midi, name).0
    }

    /// On-screen keyboard or any other host-driven source.
    pub fn add_virtual_source(&mut self, name: &str) -> u32 {
        self.session.add_source(SourceKind::Virtual, name).0
    }

    pub fn remove_source(&mut self, source: u32) -> bool {
        self.session.remove_source(SourceId(source))
    }

    pub fn midi_message(&mut self, source: u32, data: &[u8]) -> Result<(), JsValue> {
        self.session
            .midi_message(SourceId(source), data)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn key_down(&mut self, key: &str) -> bool {
        self.session.key_down(key)
    }

    pub fn key_up(&mut self, key: &str) -> bool {
        self.session.key_up(key)
    }

    pub fn blur(&mut self) {
        self.session.blur();
    }

    /// Advances the run by `delta` seconds. Returns `{snapshot, matched, completed}`.
    pub fn tick(&mut self, delta: f64) -> Result<JsValue, JsValue> {
        let tick = self.session.tick(delta);
        to_js(&tick)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.snapshot())
    }

    pub fn frame(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.frame())
    }

    pub fn stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.stats())
    }

    pub fn log(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.log_entries())
    }

    pub fn held_pitches(&self) -> Vec<u8> {
        self.session.held_pitches()
    }

    pub fn user_stats(&mut self) -> Result<JsValue, JsValue> {
        let stats = self
            .session
            .user_stats()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&stats)
    }

    /// Coaching request for the current run log.
    pub fn insight_request(&self) -> Result<JsValue, JsValue> {
        let request = services::InsightRequest::from_log(self.session.log_entries())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&request)
    }
}

/// Parse and validate a MusicXML document, returning a Score.
#[wasm_bindgen]
pub fn parse_musicxml(xml: &str) -> Result<JsValue, JsValue> {
    let score = parser::parse_musicxml(xml)
        .and_then(|score| ScoreModel::load(score).map_err(TrainerError::from))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(score.template())
}

/// Check a Score object; returns it normalized (ids filled, notes sorted).
#[wasm_bindgen]
pub fn validate_score(score_js: JsValue) -> Result<JsValue, JsValue> {
    let score = load_js_score(score_js)?;
    to_js(score.template())
}

/// Coaching insight from a raw JSON response; falls back to the default.
#[wasm_bindgen]
pub fn parse_insight(json: &str) -> Result<JsValue, JsValue> {
    to_js(&services::parse_insight(json))
}

/// Remedial exercise from a raw JSON response; falls back to the default.
#[wasm_bindgen]
pub fn parse_exercise(json: &str) -> Result<JsValue, JsValue> {
    to_js(services::parse_exercise(json).template())
}

/// Request body for a remedial exercise.
#[wasm_bindgen]
pub fn exercise_request(trouble_pitches: &[u8]) -> Result<JsValue, JsValue> {
    to_js(&services::ExerciseRequest::new(trouble_pitches))
}

/// Trouble pitches from a user-stats object, worst first.
#[wasm_bindgen]
pub fn trouble_pitches(stats_js: JsValue, limit: usize) -> Result<Vec<u8>, JsValue> {
    let json = js_sys::JSON::stringify(&stats_js)?
        .as_string()
        .ok_or_else(|| JsValue::from_str("user stats are not serializable"))?;
    let stats: UserStats =
        serde_json::from_str(&json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(stats.trouble_pitches(limit))
}

/// Generate a local drill for the given trouble pitches, returning a Score.
#[wasm_bindgen]
pub fn generate_drill(trouble_pitches: &[u8], tempo: f64) -> Result<JsValue, JsValue> {
    to_js(&exercises::trouble_drill(trouble_pitches, tempo))
}

#[wasm_bindgen]
pub fn fallback_exercise() -> Result<JsValue, JsValue> {
    to_js(&exercises::fallback_exercise())
}

#[wasm_bindgen]
pub fn note_name(pitch: u8) -> String {
    crate::pitch::midi_to_name(pitch)
}

#[wasm_bindgen]
pub fn pitch_for_key(key: &str) -> Option<u8> {
    input::keyboard::pitch_for_key(key)
}

/// Keyboard keys that play `pitch`, preferred key first.
#[wasm_bindgen]
pub fn keys_for_pitch(pitch: u8) -> Result<JsValue, JsValue> {
    to_js(&input::keyboard::keys_for_pitch(pitch))
}
