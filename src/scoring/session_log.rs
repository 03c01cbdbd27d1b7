use crate::scoring::types::{LogEntry, SessionRecord, Stats};
use crate::services::SessionStore;

/// Log of the active run plus the queue of entries not yet handed to the
/// session service.
///
/// Delivery is at most once: a batch leaves the queue when it is sent,
/// whether or not the service accepted it.
#[derive(Debug, Clone)]
pub struct SessionLog {
    entries: Vec<LogEntry>,
    unsynced: Vec<LogEntry>,
    last_sync_ms: f64,
    sync_interval_ms: f64,
}

impl SessionLog {
    pub fn new(sync_interval_ms: f64) -> Self {
        SessionLog {
            entries: Vec::new(),
            unsynced: Vec::new(),
            last_sync_ms: 0.0,
            sync_interval_ms,
        }
    }

    /// Empties the log and restarts the sync timer at `now_ms`.
    pub fn begin_run(&mut self, now_ms: f64) {
        self.clear();
        self.last_sync_ms = now_ms;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.unsynced.clear();
        self.last_sync_ms = 0.0;
    }

    pub fn record(&mut self, entry: LogEntry) {
        self.unsynced.push(entry.clone());
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn unsynced(&self) -> &[LogEntry] {
        &self.unsynced
    }

    pub fn stats(&self) -> Stats {
        Stats::from_entries(&self.entries)
    }

    pub fn sync_due(&self, now_ms: f64) -> bool {
        !self.unsynced.is_empty() && now_ms - self.last_sync_ms >= self.sync_interval_ms
    }

    /// Sends the pending batch if the sync interval has elapsed. Returns true
    /// when a batch was sent (successfully or not).
    pub fn poll_sync(&mut self, now_ms: f64, run_id: &str, store: &mut dyn SessionStore) -> bool {
        if !self.sync_due(now_ms) {
            return false;
        }
        let batch = std::mem::take(&mut self.unsynced);
        self.last_sync_ms = now_ms;
        match store.sync_logs(run_id, &batch) {
            Ok(()) => log::debug!("Synced {} log entries for {}", batch.len(), run_id),
            Err(e) => log::warn!("Dropped {} log entries for {}: {}", batch.len(), run_id, e),
        }
        true
    }

    /// Completion flush: saves the session together with whatever was never
    /// synced, then empties the queue. The full log stays readable.
    pub fn flush_completed(
        &mut self,
        record: &SessionRecord,
        store: &mut dyn SessionStore,
    ) -> Option<String> {
        let batch = std::mem::take(&mut self.unsynced);
        match store.save_session(record, &batch) {
            Ok(session_id) => {
                log::info!(
                    "Saved session {} for '{}' ({} entries)",
                    session_id,
                    record.song_title,
                    batch.len()
                );
                Some(session_id)
            }
            Err(e) => {
                log::warn!("Session for '{}' not saved: {}", record.song_title, e);
                None
            }
        }
    }

    /// Drops the pending queue without sending it.
    pub fn discard_unsynced(&mut self) {
        self.unsynced.clear();
    }
}
