pub mod coach;
pub mod store;

pub use coach::{
    parse_exercise, parse_insight, request_exercise, request_insights, CoachInsight,
    CoachingService, Dynamics, ExerciseRequest, InsightRequest,
};
pub use store::{HostReply, RecentSession, SessionStore, UserStats};
