pub mod session_log;
pub mod types;

pub use session_log::SessionLog;
pub use types::{LogEntry, SessionRecord, Stats};
