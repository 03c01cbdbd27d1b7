pub mod model;
pub mod types;

pub use model::{ScoreModel, TRAILING_GRACE};
pub use types::{Score, ScoreNote, WorkingNote};
