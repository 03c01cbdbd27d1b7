const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Highest valid MIDI pitch.
pub const MAX_PITCH: u8 = 127;

pub fn midi_to_name(pitch: u8) -> String {
    let name = NOTE_NAMES[(pitch % 12) as usize];
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", name, octave)
}

pub fn is_black_key(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}

/// MIDI number for a spelled pitch, e.g. `('C', 0, 4)` is middle C (60).
/// Returns `None` when the result falls outside 0-127.
pub fn midi_from_pitch(step: char, alter: i32, octave: i32) -> Option<u8> {
    let base = match step.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let midi = octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(base)?
        .checked_add(alter)?;
    u8::try_from(midi).ok().filter(|m| *m <= MAX_PITCH)
}
