use crate::pitch::MAX_PITCH;

const PITCH_COUNT: usize = MAX_PITCH as usize + 1;

/// Set of currently held pitches, each with the normalized velocity (0-1)
/// of the note-on that started it.
#[derive(Clone, Debug, PartialEq)]
pub struct HeldNotes {
    velocities: [Option<f32>; PITCH_COUNT],
}

impl Default for HeldNotes {
    fn default() -> Self {
        HeldNotes {
            velocities: [None; PITCH_COUNT],
        }
    }
}

impl HeldNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `pitch` as held. Out-of-range pitches are ignored.
    pub fn press(&mut self, pitch: u8, velocity: f32) {
        if let Some(slot) = self.velocities.get_mut(pitch as usize) {
            *slot = Some(velocity.clamp(0.0, 1.0));
        }
    }

    pub fn release(&mut self, pitch: u8) {
        if let Some(slot) = self.velocities.get_mut(pitch as usize) {
            *slot = None;
        }
    }

    pub fn clear(&mut self) {
        self.velocities = [None; PITCH_COUNT];
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.velocity(pitch).is_some()
    }

    pub fn velocity(&self, pitch: u8) -> Option<f32> {
        self.velocities.get(pitch as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.velocities.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.velocities.iter().all(|v| v.is_none())
    }

    /// Held pitches in ascending order.
    pub fn pitches(&self) -> impl Iterator<Item = u8> + '_ {
        self.velocities
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(pitch, _)| pitch as u8)
    }

    /// Adds every pitch held in `other`. A pitch held on both sides keeps the
    /// louder velocity.
    pub fn merge(&mut self, other: &HeldNotes) {
        for (mine, theirs) in self.velocities.iter_mut().zip(other.velocities.iter()) {
            *mine = match (*mine, *theirs) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }
    }
}

impl FromIterator<u8> for HeldNotes {
    /// Builds a set with every pitch at full velocity.
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut held = HeldNotes::new();
        for pitch in iter {
            held.press(pitch, 1.0);
        }
        held
    }
}
