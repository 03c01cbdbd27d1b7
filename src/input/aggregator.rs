use serde::Serialize;

use crate::error::{Result, TrainerError};
use crate::input::held::HeldNotes;
use crate::input::InputEdge;

/// Handle returned by `InputAggregator::register`.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Midi,
    Keyboard,
    Virtual,
}

#[derive(Debug, Clone)]
struct Source {
    id: SourceId,
    kind: SourceKind,
    name: String,
    held: HeldNotes,
}

/// Merges every registered note source into one set of held pitches.
#[derive(Debug, Clone, Default)]
pub struct InputAggregator {
    sources: Vec<Source>,
    next_id: u32,
}

impl InputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: SourceKind, name: impl Into<String>) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        let name = name.into();
        log::debug!("Registered {:?} input source {} ({})", kind, id.0, name);
        self.sources.push(Source {
            id,
            kind,
            name,
            held: HeldNotes::new(),
        });
        id
    }

    /// Drops a source (device unplugged); whatever it held is released.
    pub fn unregister(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        before != self.sources.len()
    }

    pub fn apply(&mut self, id: SourceId, edge: InputEdge) -> Result<()> {
        let source = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| TrainerError::InputSourceUnavailable(format!("source {}", id.0)))?;
        match edge {
            InputEdge::Down { pitch, velocity } => source.held.press(pitch, velocity),
            InputEdge::Up { pitch } => source.held.release(pitch),
            InputEdge::ReleaseAll => source.held.clear(),
        }
        Ok(())
    }

    /// Releases every pitch on every source. Used when a run is torn down so
    /// no stale press carries into the next one.
    pub fn release_everything(&mut self) {
        for source in self.sources.iter_mut() {
            source.held.clear();
        }
    }

    /// Union of all sources at this instant.
    pub fn snapshot(&self) -> HeldNotes {
        let mut held = HeldNotes::new();
        for source in &self.sources {
            held.merge(&source.held);
        }
        held
    }

    pub fn source_name(&self, id: SourceId) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
    }

    pub fn has_kind(&self, kind: SourceKind) -> bool {
        self.sources.iter().any(|s| s.kind == kind)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}
