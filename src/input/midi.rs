use crate::input::InputEdge;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;

const ALL_SOUND_OFF: u8 = 120;
const ALL_NOTES_OFF: u8 = 123;

/// Decodes one raw MIDI message into an input edge.
///
/// Note-on with velocity 0 is a note-off. All-sound-off and all-notes-off
/// controllers release everything the device holds. Anything else, including
/// malformed or truncated messages, yields `None`.
pub fn decode(bytes: &[u8]) -> Option<InputEdge> {
    let (&status, data) = bytes.split_first()?;
    if status < 0x80 || data.len() < 2 {
        return None;
    }
    let (first, second) = (data[0], data[1]);
    if first > 0x7F || second > 0x7F {
        return None;
    }

    match status & 0xF0 {
        NOTE_ON if second > 0 => Some(InputEdge::Down {
            pitch: first,
            velocity: second as f32 / 127.0,
        }),
        NOTE_ON | NOTE_OFF => Some(InputEdge::Up { pitch: first }),
        CONTROL_CHANGE if first == ALL_SOUND_OFF || first == ALL_NOTES_OFF => {
            Some(InputEdge::ReleaseAll)
        }
        _ => None,
    }
}
