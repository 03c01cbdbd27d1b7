pub mod names;

pub use names::{is_black_key, midi_from_pitch, midi_to_name, MAX_PITCH};
