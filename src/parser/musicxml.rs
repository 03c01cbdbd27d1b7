use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, TrainerError};
use crate::pitch::midi_from_pitch;
use crate::score::{Score, ScoreNote};

const DEFAULT_TEMPO: f64 = 120.0;
const DEFAULT_VELOCITY: f64 = 0.7;

/// A note while still measured in quarter-note beats.
struct BeatNote {
    pitch: u8,
    start_beat: f64,
    duration_beats: f64,
}

/// Tempo changes keyed by beat position.
struct TempoMap {
    changes: Vec<(f64, f64)>,
}

impl TempoMap {
    fn new(mut changes: Vec<(f64, f64)>) -> Self {
        changes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        // Later marks at the same beat override earlier ones.
        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(changes.len() + 1);
        for (beat, bpm) in changes {
            match merged.last_mut() {
                Some(last) if (last.0 - beat).abs() < 1e-9 => last.1 = bpm,
                _ => merged.push((beat, bpm)),
            }
        }
        if merged.first().map_or(true, |(beat, _)| *beat > 0.0) {
            merged.insert(0, (0.0, DEFAULT_TEMPO));
        }
        TempoMap { changes: merged }
    }

    fn seconds_at(&self, beat: f64) -> f64 {
        let mut seconds = 0.0;
        for (i, &(from, bpm)) in self.changes.iter().enumerate() {
            if beat <= from {
                break;
            }
            let to = self
                .changes
                .get(i + 1)
                .map_or(beat, |(next, _)| next.min(beat));
            seconds += (to - from) * 60.0 / bpm;
        }
        seconds
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| std::str::from_utf8(&a.value).ok().map(str::to_string))
}

fn tempo_attr(e: &BytesStart) -> Option<f64> {
    attr_value(e, b"tempo")
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t > 0.0)
}

/// Converts a MusicXML (partwise) document to a score in seconds.
///
/// Every part is read; staves and voices are untangled through `<backup>`
/// and `<forward>`. Chord members share the onset of the preceding note,
/// tied notes are merged, rests and grace notes produce nothing. Beats are
/// converted to seconds with the document's tempo marks (120 bpm until the
/// first one).
pub fn parse_musicxml(xml: &str) -> Result<Score> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();

    let mut divisions: f64 = 1.0;
    let mut tempo_changes: Vec<(f64, f64)> = Vec::new();
    let mut notes: Vec<BeatNote> = Vec::new();
    // pitch -> index in `notes` of a note whose tie is still open
    let mut open_ties: HashMap<u8, usize> = HashMap::new();

    let mut current_beat: f64 = 0.0;
    let mut end_beat: f64 = 0.0;
    let mut last_note_start: f64 = 0.0;

    let mut current_tag: Option<&'static str> = None;

    // Note state
    let mut in_note = false;
    let mut note_is_rest = false;
    let mut note_is_chord = false;
    let mut note_is_grace = false;
    let mut tie_start = false;
    let mut tie_stop = false;
    let mut note_duration_divs: Option<f64> = None;
    let mut step: Option<char> = None;
    let mut alter: i32 = 0;
    let mut octave: Option<i32> = None;

    // <backup>/<forward> move the cursor by their own <duration>
    let mut cursor_shift: Option<f64> = None;
    let mut shift_divs: f64 = 0.0;

    let mut title: Option<String> = None;
    let mut composer: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"part" => {
                    end_beat = end_beat.max(current_beat);
                    current_beat = 0.0;
                    last_note_start = 0.0;
                    open_ties.clear();
                }
                b"note" => {
                    in_note = true;
                    note_is_rest = false;
                    note_is_chord = false;
                    note_is_grace = false;
                    tie_start = false;
                    tie_stop = false;
                    note_duration_divs = None;
                    step = None;
                    alter = 0;
                    octave = None;
                }
                b"backup" => {
                    cursor_shift = Some(-1.0);
                    shift_divs = 0.0;
                }
                b"forward" => {
                    cursor_shift = Some(1.0);
                    shift_divs = 0.0;
                }
                b"rest" if in_note => note_is_rest = true,
                b"divisions" => current_tag = Some("divisions"),
                b"duration" => current_tag = Some("duration"),
                b"step" => current_tag = Some("step"),
                b"alter" => current_tag = Some("alter"),
                b"octave" => current_tag = Some("octave"),
                b"per-minute" => current_tag = Some("per-minute"),
                b"movement-title" => current_tag = Some("movement-title"),
                b"work-title" => current_tag = Some("work-title"),
                b"creator" => {
                    if attr_value(e, b"type").as_deref() == Some("composer") {
                        current_tag = Some("composer");
                    }
                }
                b"sound" => {
                    if let Some(t) = tempo_attr(e) {
                        tempo_changes.push((current_beat, t));
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"sound" => {
                    if let Some(t) = tempo_attr(e) {
                        tempo_changes.push((current_beat, t));
                    }
                }
                b"rest" if in_note => note_is_rest = true,
                b"chord" if in_note => note_is_chord = true,
                b"grace" if in_note => note_is_grace = true,
                b"tie" if in_note => match attr_value(e, b"type").as_deref() {
                    Some("start") => tie_start = true,
                    Some("stop") => tie_stop = true,
                    _ => {}
                },
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(tag) = current_tag.take() {
                    let text = e
                        .unescape()
                        .map_err(|e| TrainerError::MusicXml(e.to_string()))?;
                    let text = text.trim();
                    match tag {
                        "divisions" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 {
                                    divisions = v;
                                }
                            }
                        }
                        "per-minute" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v.is_finite() && v > 0.0 {
                                    tempo_changes.push((current_beat, v));
                                }
                            }
                        }
                        "duration" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if in_note {
                                    note_duration_divs = Some(v);
                                } else if cursor_shift.is_some() {
                                    shift_divs = v;
                                }
                            }
                        }
                        "step" => step = text.chars().next(),
                        "alter" => {
                            if let Ok(v) = text.parse::<f64>() {
                                alter = v.round() as i32;
                            }
                        }
                        "octave" => {
                            if let Ok(v) = text.parse::<i32>() {
                                octave = Some(v);
                            }
                        }
                        "movement-title" | "work-title" => {
                            if title.is_none() {
                                title = Some(text.to_string());
                            }
                        }
                        "composer" => {
                            if composer.is_none() {
                                composer = Some(text.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"note" if in_note => {
                    in_note = false;
                    if note_is_grace {
                        continue;
                    }
                    let duration_beats = note_duration_divs.unwrap_or(0.0) / divisions;
                    let start_beat = if note_is_chord {
                        last_note_start
                    } else {
                        current_beat
                    };
                    if !note_is_chord {
                        last_note_start = start_beat;
                        current_beat += duration_beats;
                        end_beat = end_beat.max(current_beat);
                    }
                    if note_is_rest || duration_beats <= 0.0 {
                        continue;
                    }

                    let s = step.ok_or_else(|| TrainerError::MusicXml("missing pitch step".into()))?;
                    let o = octave.ok_or_else(|| TrainerError::MusicXml("missing pitch octave".into()))?;
                    let pitch = midi_from_pitch(s, alter, o).ok_or_else(|| {
                        TrainerError::MusicXml(format!("pitch {}{} octave {} out of range", s, alter, o))
                    })?;

                    if tie_stop {
                        if let Some(&index) = open_ties.get(&pitch) {
                            let tied = &mut notes[index];
                            tied.duration_beats = start_beat + duration_beats - tied.start_beat;
                            if !tie_start {
                                open_ties.remove(&pitch);
                            }
                            continue;
                        }
                    }
                    notes.push(BeatNote {
                        pitch,
                        start_beat,
                        duration_beats,
                    });
                    if tie_start {
                        open_ties.insert(pitch, notes.len() - 1);
                    }
                }
                b"backup" | b"forward" => {
                    if let Some(sign) = cursor_shift.take() {
                        current_beat = (current_beat + sign * shift_divs / divisions).max(0.0);
                        end_beat = end_beat.max(current_beat);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrainerError::MusicXml(format!("XML parse error: {}", e))),
            _ => {}
        }
    }

    let tempo = TempoMap::new(tempo_changes);
    let score_notes: Vec<ScoreNote> = notes
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let onset = tempo.seconds_at(n.start_beat);
            let duration = tempo.seconds_at(n.start_beat + n.duration_beats) - onset;
            ScoreNote::new((i + 1).to_string(), n.pitch, onset, duration, DEFAULT_VELOCITY)
        })
        .collect();
    let last_end = score_notes.iter().map(ScoreNote::end).fold(0.0_f64, f64::max);

    Ok(Score {
        title: title.unwrap_or_else(|| "Untitled".to_string()),
        author: composer.unwrap_or_default(),
        total_duration: tempo.seconds_at(end_beat).max(last_end),
        notes: score_notes,
    })
}
