use std::collections::BTreeMap;

use crate::input::InputEdge;

/// 61-key layout, C2 (36) through C7 (96), followed by alternative keys for
/// a few pitches. Identifiers are normalized key names (see `normalize_key`).
const KEY_MAP: &[(&str, u8)] = &[
    // C2-B2: punctuation row and the left edge
    (",", 36),
    ("l", 37),
    (".", 38),
    (";", 39),
    ("/", 40),
    ("shift", 41),
    ("\\", 42),
    ("`", 43),
    ("1", 44),
    ("tab", 45),
    ("capslock", 46),
    ("a", 47),
    // C3-B3: Z row whites, home row blacks
    ("z", 48),
    ("s", 49),
    ("x", 50),
    ("d", 51),
    ("c", 52),
    ("v", 53),
    ("g", 54),
    ("b", 55),
    ("h", 56),
    ("n", 57),
    ("j", 58),
    ("m", 59),
    // C4-B4: Q row whites, number row blacks
    ("q", 60),
    ("2", 61),
    ("w", 62),
    ("3", 63),
    ("e", 64),
    ("r", 65),
    ("5", 66),
    ("t", 67),
    ("6", 68),
    ("y", 69),
    ("7", 70),
    ("u", 71),
    // C5-A5
    ("i", 72),
    ("9", 73),
    ("o", 74),
    ("0", 75),
    ("p", 76),
    ("[", 77),
    ("=", 78),
    ("]", 79),
    ("-", 80),
    ("backspace", 81),
    // A#5-C7: function keys and the navigation cluster
    ("f1", 82),
    ("f2", 83),
    ("f3", 84),
    ("f4", 85),
    ("f5", 86),
    ("f6", 87),
    ("f7", 88),
    ("f8", 89),
    ("f9", 90),
    ("f10", 91),
    ("f11", 92),
    ("f12", 93),
    ("insert", 94),
    ("home", 95),
    ("pageup", 96),
    // alternatives
    ("f", 65),
    ("k", 71),
    ("'", 79),
    ("4", 64),
    ("8", 72),
];

/// Normalizes a browser `KeyboardEvent.key` value (`"Q"`, `"Tab"`,
/// `"PageUp"`, `"F5"`) to the identifiers used by the layout.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

pub fn pitch_for_key(key: &str) -> Option<u8> {
    let key = normalize_key(key);
    KEY_MAP
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, pitch)| *pitch)
}

/// Keys that play `pitch`; single letters first so labels prefer them.
pub fn keys_for_pitch(pitch: u8) -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = KEY_MAP
        .iter()
        .filter(|(_, p)| *p == pitch)
        .map(|(name, _)| *name)
        .collect();
    keys.sort_by_key(|name| !(name.len() == 1 && name.chars().all(|c| c.is_ascii_lowercase())));
    keys
}

/// Computer-keyboard note source. Tracks which physical keys are down so
/// auto-repeat is ignored and a pitch reached by two keys stays held until
/// both are up.
#[derive(Debug, Clone)]
pub struct KeyboardPiano {
    pressed: BTreeMap<String, u8>,
    velocity: f32,
}

impl KeyboardPiano {
    pub fn new(velocity: f32) -> Self {
        KeyboardPiano {
            pressed: BTreeMap::new(),
            velocity,
        }
    }

    pub fn key_down(&mut self, key: &str) -> Option<InputEdge> {
        let key = normalize_key(key);
        if self.pressed.contains_key(&key) {
            return None;
        }
        let pitch = pitch_for_key(&key)?;
        let already_held = self.pressed.values().any(|p| *p == pitch);
        self.pressed.insert(key, pitch);
        if already_held {
            None
        } else {
            Some(InputEdge::Down {
                pitch,
                velocity: self.velocity,
            })
        }
    }

    pub fn key_up(&mut self, key: &str) -> Option<InputEdge> {
        let pitch = self.pressed.remove(&normalize_key(key))?;
        if self.pressed.values().any(|p| *p == pitch) {
            None
        } else {
            Some(InputEdge::Up { pitch })
        }
    }

    /// Window lost focus: key-up events will never arrive.
    pub fn blur(&mut self) -> InputEdge {
        self.pressed.clear();
        InputEdge::ReleaseAll
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = &str> {
        self.pressed.keys().map(String::as_str)
    }
}
