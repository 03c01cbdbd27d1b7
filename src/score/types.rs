use serde::{Deserialize, Serialize};

fn default_velocity() -> f64 {
    0.7
}

/// One scheduled note of a score. Times are in seconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreNote {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "midi")]
    pub pitch: u8,
    #[serde(alias = "time")]
    pub onset: f64,
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
}

impl ScoreNote {
    pub fn new(id: impl Into<String>, pitch: u8, onset: f64, duration: f64, velocity: f64) -> Self {
        ScoreNote {
            id: id.into(),
            pitch,
            onset,
            duration,
            velocity,
        }
    }

    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub title: String,
    #[serde(default, alias = "artist")]
    pub author: String,
    #[serde(alias = "duration")]
    pub total_duration: f64,
    #[serde(default)]
    pub notes: Vec<ScoreNote>,
}

/// Per-run working copy of a score note.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingNote {
    #[serde(flatten)]
    pub note: ScoreNote,
    pub played: bool,
}

impl From<&ScoreNote> for WorkingNote {
    fn from(note: &ScoreNote) -> Self {
        WorkingNote {
            note: note.clone(),
            played: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_canonical_shape() {
        let json = r#"{
            "title": "Etude",
            "author": "Someone",
            "totalDuration": 4.0,
            "notes": [{"id": "a", "pitch": 60, "onset": 0.5, "duration": 1.0, "velocity": 0.5}]
        }"#;
        let score: Score = serde_json::from_str(json).unwrap();
        assert_eq!(score.author, "Someone");
        assert_eq!(score.total_duration, 4.0);
        assert_eq!(score.notes[0].pitch, 60);
        assert_eq!(score.notes[0].onset, 0.5);
    }

    #[test]
    fn test_deserialize_song_file_shape() {
        let json = r#"{
            "title": "Gymnopedie",
            "artist": "Erik Satie",
            "duration": 30,
            "notes": [{"id": "1", "midi": 43, "time": 0.0, "duration": 2.0}]
        }"#;
        let score: Score = serde_json::from_str(json).unwrap();
        assert_eq!(score.author, "Erik Satie");
        assert_eq!(score.total_duration, 30.0);
        assert_eq!(score.notes[0].pitch, 43);
        assert_eq!(score.notes[0].duration, 2.0);
        assert_eq!(score.notes[0].velocity, 0.7);
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let score = Score {
            title: "t".to_string(),
            author: String::new(),
            total_duration: 1.0,
            notes: vec![],
        };
        let json = serde_json::to_string(&score).unwrap();
        assert!(json.contains("\"totalDuration\":1.0"));
    }
}
