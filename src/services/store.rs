use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::scoring::types::{LogEntry, SessionRecord};

/// Session/stats service. Implementations report failures as
/// `TrainerError::PersistenceUnavailable`; callers log and move on.
pub trait SessionStore {
    /// Stores a finished session with its remaining log entries and returns
    /// the new session id.
    fn save_session(&mut self, session: &SessionRecord, logs: &[LogEntry]) -> Result<String>;

    /// Appends a batch of entries to a running session. Fire-and-forget.
    fn sync_logs(&mut self, session_id: &str, logs: &[LogEntry]) -> Result<()>;

    fn user_stats(&mut self, user_id: &str) -> Result<UserStats>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentSession {
    pub id: String,
    pub song_title: String,
    pub accuracy: u32,
    pub date: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub total_sessions: u32,
    pub total_minutes: u32,
    pub avg_accuracy: u32,
    pub recent_sessions: Vec<RecentSession>,
    /// Pitch -> number of incorrect attempts.
    pub trouble_notes: BTreeMap<u8, u32>,
}

impl UserStats {
    /// Pitches with the most incorrect attempts first; ties go to the lower
    /// pitch.
    pub fn trouble_pitches(&self, limit: usize) -> Vec<u8> {
        let mut counts: Vec<(u8, u32)> = self
            .trouble_notes
            .iter()
            .map(|(pitch, count)| (*pitch, *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.into_iter().take(limit).map(|(pitch, _)| pitch).collect()
    }
}

/// What a host-side store callback handed back. An asynchronous host returns
/// a promise, whose value cannot be read from inside a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum HostReply<T> {
    Ready(T),
    Pending,
}

impl<T> HostReply<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> HostReply<U> {
        match self {
            HostReply::Ready(value) => HostReply::Ready(f(value)),
            HostReply::Pending => HostReply::Pending,
        }
    }

    pub fn ready(self, callback: &str) -> Result<T> {
        match self {
            HostReply::Ready(value) => Ok(value),
            HostReply::Pending => Err(TrainerError::PersistenceUnavailable(format!(
                "{} returned a Promise; its result is not available synchronously",
                callback
            ))),
        }
    }
}

impl HostReply<Option<String>> {
    /// Session id from a `saveSession` reply.
    pub fn session_id(self) -> Result<String> {
        self.ready("saveSession")?.ok_or_else(|| {
            TrainerError::PersistenceUnavailable("saveSession did not return a session id".to_string())
        })
    }
}

impl HostReply<String> {
    /// User stats from the JSON text of a `getUserStats` reply.
    pub fn user_stats(self) -> Result<UserStats> {
        let json = self.ready("getUserStats")?;
        Ok(serde_json::from_str(&json)?)
    }
}
