use serde::{Deserialize, Serialize};

/// One resolved event of a performance run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Wall-clock time of the event, epoch milliseconds.
    pub timestamp: f64,
    #[serde(alias = "note")]
    pub pitch: u8,
    #[serde(default, alias = "expectedNote", skip_serializing_if = "Option::is_none")]
    pub expected_pitch: Option<u8>,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    /// How long the player kept the note waiting (ms), timed per note. Zero
    /// when it was already held as it fell due, negative when struck inside
    /// the early tolerance window; never positive without a wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_gap: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_notes: u32,
    pub correct_notes: u32,
    /// Rounded percentage, 0-100.
    pub accuracy: u32,
    /// Mean strike velocity, 0-1. Entries without a velocity count as 0.
    pub average_velocity: f64,
}

impl Stats {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let total_notes = entries.len() as u32;
        if total_notes == 0 {
            return Stats::default();
        }
        let correct_notes = entries.iter().filter(|e| e.is_correct).count() as u32;
        let accuracy = (100.0 * correct_notes as f64 / total_notes as f64).round() as u32;
        let average_velocity =
            entries.iter().map(|e| e.velocity.unwrap_or(0.0)).sum::<f64>() / total_notes as f64;

        Stats {
            total_notes,
            correct_notes,
            accuracy,
            average_velocity,
        }
    }
}

/// Summary handed to the session service when a run completes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub song_title: String,
    pub accuracy: u32,
    pub total_notes: u32,
    pub average_velocity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(is_correct: bool, velocity: Option<f64>) -> LogEntry {
        LogEntry {
            timestamp: 0.0,
            pitch: 60,
            expected_pitch: Some(60),
            is_correct,
            velocity,
            time_gap: None,
        }
    }

    #[test]
    fn test_empty_stats() {
        let stats = Stats::from_entries(&[]);
        assert_eq!(stats.total_notes, 0);
        assert_eq!(stats.accuracy, 0);
        assert_eq!(stats.average_velocity, 0.0);
    }

    #[test]
    fn test_accuracy_rounds() {
        // 2 of 3 = 66.67 -> 67
        let entries = vec![entry(true, None), entry(true, None), entry(false, None)];
        let stats = Stats::from_entries(&entries);
        assert_eq!(stats.correct_notes, 2);
        assert_eq!(stats.accuracy, 67);

        // 1 of 3 = 33.3 -> 33
        let entries = vec![entry(true, None), entry(false, None), entry(false, None)];
        assert_eq!(Stats::from_entries(&entries).accuracy, 33);
    }

    #[test]
    fn test_accuracy_stays_in_range() {
        for total in 1..40usize {
            for correct in 0..=total {
                let entries: Vec<LogEntry> =
                    (0..total).map(|i| entry(i < correct, None)).collect();
                let stats = Stats::from_entries(&entries);
                assert!(stats.accuracy <= 100);
                let expected = (100.0 * correct as f64 / total as f64).round() as u32;
                assert_eq!(stats.accuracy, expected);
            }
        }
    }

    #[test]
    fn test_missing_velocity_counts_as_zero() {
        let entries = vec![entry(true, Some(0.8)), entry(true, None)];
        let stats = Stats::from_entries(&entries);
        assert!((stats.average_velocity - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_log_entry_wire_shape() {
        let json = serde_json::to_string(&entry(true, Some(0.5))).unwrap();
        assert!(json.contains("\"expectedPitch\":60"));
        assert!(json.contains("\"isCorrect\":true"));
        assert!(!json.contains("timeGap"));

        let legacy: LogEntry =
            serde_json::from_str(r#"{"timestamp": 1, "note": 62, "expectedNote": 62, "isCorrect": true}"#)
                .unwrap();
        assert_eq!(legacy.pitch, 62);
        assert_eq!(legacy.expected_pitch, Some(62));
        assert_eq!(legacy.velocity, None);
    }
}
