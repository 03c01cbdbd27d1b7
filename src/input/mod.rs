pub mod aggregator;
pub mod held;
pub mod keyboard;
pub mod midi;

pub use aggregator::{InputAggregator, SourceId, SourceKind};
pub use held::HeldNotes;
pub use keyboard::KeyboardPiano;

/// A discrete change reported by one note source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEdge {
    Down { pitch: u8, velocity: f32 },
    Up { pitch: u8 },
    ReleaseAll,
}
