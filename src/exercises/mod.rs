pub mod generators;

pub use generators::{
    fallback_exercise, fallback_model, trouble_drill, DEFAULT_TROUBLE_PITCHES, MAX_DRILL_PITCHES,
};
