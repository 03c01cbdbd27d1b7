//! Coaching service boundary.
//!
//! The coaching backend is opaque. This module owns the request and response
//! shapes and guarantees a usable answer: any failure, including a response
//! that does not parse or a generated score that does not validate, is
//! replaced by a static default.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::exercises::{fallback_model, DEFAULT_TROUBLE_PITCHES, MAX_DRILL_PITCHES};
use crate::score::{Score, ScoreModel};
use crate::scoring::types::{LogEntry, Stats};

const GENTLE_BELOW: f64 = 0.4;
const STRONG_ABOVE: f64 = 0.7;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dynamics {
    Gentle,
    Balanced,
    Strong,
}

impl Dynamics {
    pub fn from_velocity(average_velocity: f64) -> Self {
        if average_velocity < GENTLE_BELOW {
            Dynamics::Gentle
        } else if average_velocity > STRONG_ABOVE {
            Dynamics::Strong
        } else {
            Dynamics::Balanced
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub accuracy: u32,
    pub average_velocity: f64,
    pub total_notes: u32,
    pub correct_notes: u32,
    pub dynamics: Dynamics,
}

impl InsightRequest {
    pub fn from_log(log: &[LogEntry]) -> Result<Self> {
        if log.is_empty() {
            return Err(TrainerError::CoachingUnavailable(
                "no practice data available".to_string(),
            ));
        }
        let stats = Stats::from_entries(log);
        Ok(InsightRequest {
            accuracy: stats.accuracy,
            average_velocity: stats.average_velocity,
            total_notes: stats.total_notes,
            correct_notes: stats.correct_notes,
            dynamics: Dynamics::from_velocity(stats.average_velocity),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoachInsight {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub practice_routine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_analysis: Option<String>,
}

impl CoachInsight {
    pub fn fallback() -> Self {
        CoachInsight {
            summary: "Keep practicing!".to_string(),
            strengths: vec!["dedication".to_string()],
            improvements: vec!["consistency".to_string()],
            practice_routine: "Scale C Major".to_string(),
            mood_analysis: Some("You seem focused.".to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseRequest {
    pub trouble_pitches: Vec<u8>,
}

impl ExerciseRequest {
    /// Keeps the first `MAX_DRILL_PITCHES` pitches; an empty list asks for
    /// the default pitches instead.
    pub fn new(trouble_pitches: &[u8]) -> Self {
        let trouble_pitches = if trouble_pitches.is_empty() {
            DEFAULT_TROUBLE_PITCHES.to_vec()
        } else {
            trouble_pitches
                .iter()
                .copied()
                .take(MAX_DRILL_PITCHES)
                .collect()
        };
        ExerciseRequest { trouble_pitches }
    }
}

/// AI-backed coaching backend, supplied by the host.
pub trait CoachingService {
    fn insights(&mut self, request: &InsightRequest, log: &[LogEntry]) -> Result<CoachInsight>;

    fn remedial_exercise(&mut self, request: &ExerciseRequest) -> Result<Score>;
}

/// Asks the service for insights on a finished run. Never fails.
pub fn request_insights(service: &mut dyn CoachingService, log: &[LogEntry]) -> CoachInsight {
    let outcome = InsightRequest::from_log(log).and_then(|request| service.insights(&request, log));
    match outcome {
        Ok(insight) => insight,
        Err(e) => {
            log::warn!("Using default coaching insight: {}", e);
            CoachInsight::fallback()
        }
    }
}

/// Asks the service for a remedial exercise. Never fails; a generated score
/// is only accepted if it loads.
pub fn request_exercise(service: &mut dyn CoachingService, trouble_pitches: &[u8]) -> ScoreModel {
    let request = ExerciseRequest::new(trouble_pitches);
    let outcome = service
        .remedial_exercise(&request)
        .and_then(|score| ScoreModel::load(score).map_err(TrainerError::from));
    match outcome {
        Ok(model) => model,
        Err(e) => {
            log::warn!("Using fallback exercise: {}", e);
            fallback_model()
        }
    }
}

/// Parses a raw insight response. Anything unusable yields the default.
pub fn parse_insight(json: &str) -> CoachInsight {
    match serde_json::from_str::<CoachInsight>(json) {
        Ok(insight) if !insight.summary.trim().is_empty() => insight,
        Ok(_) => {
            log::warn!("Coaching insight had an empty summary");
            CoachInsight::fallback()
        }
        Err(e) => {
            log::warn!("Coaching insight did not parse: {}", e);
            CoachInsight::fallback()
        }
    }
}

/// Parses and validates a raw exercise response, or returns the fallback.
pub fn parse_exercise(json: &str) -> ScoreModel {
    let outcome = serde_json::from_str::<Score>(json)
        .map_err(TrainerError::from)
        .and_then(|score| ScoreModel::load(score).map_err(TrainerError::from));
    match outcome {
        Ok(model) => model,
        Err(e) => {
            log::warn!("Generated exercise rejected: {}", e);
            fallback_model()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreNote;

    struct ScriptedCoach {
        insight: Option<CoachInsight>,
        exercise: Option<Score>,
        last_request: Option<ExerciseRequest>,
    }

    impl CoachingService for ScriptedCoach {
        fn insights(&mut self, _request: &InsightRequest, _log: &[LogEntry]) -> Result<CoachInsight> {
            self.insight
                .clone()
                .ok_or_else(|| TrainerError::CoachingUnavailable("quota".to_string()))
        }

        fn remedial_exercise(&mut self, request: &ExerciseRequest) -> Result<Score> {
            self.last_request = Some(request.clone());
            self.exercise
                .clone()
                .ok_or_else(|| TrainerError::CoachingUnavailable("timeout".to_string()))
        }
    }

    fn entry(velocity: f64) -> LogEntry {
        LogEntry {
            timestamp: 0.0,
            pitch: 60,
            expected_pitch: Some(60),
            is_correct: true,
            velocity: Some(velocity),
            time_gap: None,
        }
    }

    #[test]
    fn test_dynamics_thresholds() {
        assert_eq!(Dynamics::from_velocity(0.2), Dynamics::Gentle);
        assert_eq!(Dynamics::from_velocity(0.4), Dynamics::Balanced);
        assert_eq!(Dynamics::from_velocity(0.7), Dynamics::Balanced);
        assert_eq!(Dynamics::from_velocity(0.9), Dynamics::Strong);
    }

    #[test]
    fn test_insight_request_from_log() {
        let request = InsightRequest::from_log(&[entry(0.9), entry(0.9)]).unwrap();
        assert_eq!(request.accuracy, 100);
        assert_eq!(request.total_notes, 2);
        assert_eq!(request.dynamics, Dynamics::Strong);
        assert!(InsightRequest::from_log(&[]).is_err());
    }

    #[test]
    fn test_insights_fall_back_on_failure() {
        let mut coach = ScriptedCoach {
            insight: None,
            exercise: None,
            last_request: None,
        };
        assert_eq!(request_insights(&mut coach, &[entry(0.5)]), CoachInsight::fallback());
        // An empty log never reaches the service.
        assert_eq!(request_insights(&mut coach, &[]), CoachInsight::fallback());
    }

    #[test]
    fn test_insights_pass_through() {
        let insight = CoachInsight {
            summary: "Steady hands".to_string(),
            strengths: vec![],
            improvements: vec![],
            practice_routine: String::new(),
            mood_analysis: None,
        };
        let mut coach = ScriptedCoach {
            insight: Some(insight.clone()),
            exercise: None,
            last_request: None,
        };
        assert_eq!(request_insights(&mut coach, &[entry(0.5)]), insight);
    }

    #[test]
    fn test_exercise_request_caps_pitches() {
        assert_eq!(
            ExerciseRequest::new(&[1, 2, 3, 4, 5, 6, 7]).trouble_pitches,
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(ExerciseRequest::new(&[]).trouble_pitches, vec![60, 62, 64]);
    }

    #[test]
    fn test_invalid_generated_exercise_is_replaced() {
        let broken = Score {
            title: "Predictive Practice".to_string(),
            author: "AI Coach".to_string(),
            total_duration: 10.0,
            notes: vec![ScoreNote::new("1", 66, 0.0, 0.0, 0.5)],
        };
        let mut coach = ScriptedCoach {
            insight: None,
            exercise: Some(broken),
            last_request: None,
        };
        let model = request_exercise(&mut coach, &[66, 69]);
        assert_eq!(model.title(), "C Major Scale (Fallback)");
        assert_eq!(coach.last_request.unwrap().trouble_pitches, vec![66, 69]);
    }

    #[test]
    fn test_valid_generated_exercise_is_used() {
        let score = Score {
            title: "Predictive Practice".to_string(),
            author: "AI Coach".to_string(),
            total_duration: 10.0,
            notes: vec![
                ScoreNote::new("2", 69, 1.0, 1.0, 0.5),
                ScoreNote::new("1", 66, 0.0, 1.0, 0.5),
            ],
        };
        let mut coach = ScriptedCoach {
            insight: None,
            exercise: Some(score),
            last_request: None,
        };
        let model = request_exercise(&mut coach, &[66]);
        assert_eq!(model.title(), "Predictive Practice");
        assert_eq!(model.template().notes[0].pitch, 66);
    }

    #[test]
    fn test_parse_insight() {
        let insight = parse_insight(
            r#"{"summary": "Nice", "strengths": ["rhythm"], "improvements": [], "practiceRoutine": "Hanon 1", "moodAnalysis": "Calm"}"#,
        );
        assert_eq!(insight.summary, "Nice");
        assert_eq!(insight.practice_routine, "Hanon 1");
        assert_eq!(insight.mood_analysis.as_deref(), Some("Calm"));

        assert_eq!(parse_insight("not json"), CoachInsight::fallback());
        assert_eq!(parse_insight(r#"{"summary": "  "}"#), CoachInsight::fallback());
    }

    #[test]
    fn test_parse_exercise() {
        let model = parse_exercise(
            r#"{"title": "Predictive Practice", "artist": "AI Coach", "duration": 10,
                "notes": [{"midi": 66, "time": 0, "duration": 1, "velocity": 0.5, "id": "1"}]}"#,
        );
        assert_eq!(model.title(), "Predictive Practice");
        assert_eq!(model.len(), 1);

        assert_eq!(parse_exercise("{}").title(), "C Major Scale (Fallback)");
    }
}
