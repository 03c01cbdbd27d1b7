use std::cell::{Cell, RefCell};
use std::rc::Rc;

use zen_piano::config::TrainerConfig;
use zen_piano::engine::{GameState, Tick};
use zen_piano::error::{Result, TrainerError};
use zen_piano::input::SourceKind;
use zen_piano::parser::parse_musicxml;
use zen_piano::practice::PracticeSession;
use zen_piano::score::{Score, ScoreModel, ScoreNote};
use zen_piano::scoring::{LogEntry, SessionRecord};
use zen_piano::services::{SessionStore, UserStats};

thread_local! {
    static NOW_MS: Cell<f64> = Cell::new(1_000.0);
}

fn now() -> f64 {
    NOW_MS.with(|c| c.get())
}

fn set_now(ms: f64) {
    NOW_MS.with(|c| c.set(ms));
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    set_now(1_000.0);
}

#[derive(Default)]
struct Recorded {
    synced: Vec<(String, Vec<LogEntry>)>,
    saved: Vec<(SessionRecord, Vec<LogEntry>)>,
    offline: bool,
}

struct FakeStore(Rc<RefCell<Recorded>>);

impl SessionStore for FakeStore {
    fn save_session(&mut self, session: &SessionRecord, logs: &[LogEntry]) -> Result<String> {
        let mut recorded = self.0.borrow_mut();
        if recorded.offline {
            return Err(TrainerError::PersistenceUnavailable("offline".to_string()));
        }
        recorded.saved.push((session.clone(), logs.to_vec()));
        Ok(format!("session-{}", recorded.saved.len()))
    }

    fn sync_logs(&mut self, session_id: &str, logs: &[LogEntry]) -> Result<()> {
        let mut recorded = self.0.borrow_mut();
        if recorded.offline {
            return Err(TrainerError::PersistenceUnavailable("offline".to_string()));
        }
        recorded.synced.push((session_id.to_string(), logs.to_vec()));
        Ok(())
    }

    fn user_stats(&mut self, _user_id: &str) -> Result<UserStats> {
        Ok(UserStats::default())
    }
}

fn session_for(total_duration: f64, notes: Vec<ScoreNote>) -> PracticeSession {
    let score = Score {
        title: "Etude".to_string(),
        author: "Test".to_string(),
        total_duration,
        notes,
    };
    PracticeSession::new(ScoreModel::load(score).unwrap(), TrainerConfig::default())
        .with_wall_clock(now)
}

fn scale_session() -> PracticeSession {
    session_for(
        1.5,
        vec![
            ScoreNote::new("1", 60, 0.0, 0.5, 0.7),
            ScoreNote::new("2", 62, 0.5, 0.5, 0.7),
            ScoreNote::new("3", 64, 1.0, 0.5, 0.7),
        ],
    )
}

fn run_until_completed(session: &mut PracticeSession, max_ticks: usize) -> Option<Tick> {
    (0..max_ticks)
        .map(|_| session.tick(0.1))
        .find(|tick| tick.completed)
}

#[test]
fn chord_freezes_the_clock_until_complete() {
    init();
    let mut session = session_for(
        3.0,
        vec![
            ScoreNote::new("1", 60, 1.0, 1.0, 0.7),
            ScoreNote::new("2", 64, 1.0, 1.0, 0.7),
        ],
    );
    let piano = session.add_source(SourceKind::Midi, "Digital piano");
    session.start();

    let mut ticks = 0;
    while !session.tick(0.1).snapshot.waiting {
        ticks += 1;
        assert!(ticks < 20, "never started waiting");
    }
    let frozen_at = session.snapshot().clock;
    assert!(frozen_at >= 0.95 && frozen_at <= 1.0 + 1e-9);
    assert_eq!(session.snapshot().awaited_pitches, vec![60, 64]);

    session.midi_message(piano, &[0x90, 60, 100]).unwrap();
    for _ in 0..5 {
        let tick = session.tick(0.1);
        assert!(tick.snapshot.waiting);
        assert_eq!(tick.snapshot.clock, frozen_at);
    }
    assert_eq!(session.log_entries().len(), 1);
    assert_eq!(session.snapshot().awaited_pitches, vec![64]);

    session.midi_message(piano, &[0x90, 64, 80]).unwrap();
    let tick = session.tick(0.1);
    assert_eq!(tick.matched.len(), 1);
    assert_eq!(tick.matched[0].pitch, 64);
    assert!(!tick.snapshot.waiting);
    assert!(tick.snapshot.clock > frozen_at);

    let pitches: Vec<u8> = session.log_entries().iter().map(|e| e.pitch).collect();
    assert_eq!(pitches, vec![60, 64]);
    assert!(session.log_entries().iter().all(|e| e.is_correct));
}

#[test]
fn empty_score_finishes_after_grace() {
    init();
    let mut session = session_for(0.0, Vec::new());
    session.start();

    // Oversized deltas are clamped to 0.1 s.
    for _ in 0..10 {
        let tick = session.tick(5.0);
        assert!(!tick.completed);
        assert_eq!(tick.snapshot.state, GameState::Playing);
    }
    let tick = session.tick(5.0);
    assert!(tick.completed);
    assert_eq!(tick.snapshot.state, GameState::Finished);
    assert_eq!(tick.snapshot.progress, 1.0);

    let stats = session.stats();
    assert_eq!(stats.total_notes, 0);
    assert_eq!(stats.accuracy, 0);

    // Completion is reported once.
    assert!(!session.tick(0.1).completed);
}

#[test]
fn reset_while_waiting_gives_a_clean_run() {
    init();
    let mut session = scale_session();
    let piano = session.add_source(SourceKind::Midi, "Digital piano");
    session.start();

    session.midi_message(piano, &[0x90, 60, 100]).unwrap();
    session.tick(0.1);
    session.midi_message(piano, &[0x80, 60, 0]).unwrap();
    while !session.tick(0.1).snapshot.waiting {}
    assert_eq!(session.log_entries().len(), 1);

    session.reset();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, GameState::Idle);
    assert_eq!(snapshot.clock, 0.0);
    assert!(session.log_entries().is_empty());
    assert!(session.engine().notes().iter().all(|n| !n.played));

    // Idle sessions ignore ticks.
    assert_eq!(session.tick(0.1).snapshot.clock, 0.0);

    session.start();
    let tick = session.tick(0.1);
    assert!(tick.snapshot.waiting);
    assert!(tick.matched.is_empty());
}

#[test]
fn pause_holds_the_run() {
    init();
    let mut session = scale_session();
    session.start();
    session.tick(0.1);
    session.key_down("q");
    assert!(session.pause());

    let tick = session.tick(0.1);
    assert_eq!(tick.snapshot.state, GameState::Paused);
    assert!(tick.matched.is_empty());

    assert!(session.resume());
    assert!(!session.resume());
    let tick = session.tick(0.1);
    assert_eq!(tick.matched.len(), 1);
}

#[test]
fn periodic_sync_then_completion_flush() {
    init();
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let mut session = scale_session();
    session.set_store(Box::new(FakeStore(recorded.clone())));
    session.sign_in("user-7");
    let piano = session.add_source(SourceKind::Midi, "Digital piano");

    let run_id = session.start();
    assert_eq!(run_id, "run-1000-1");

    session.midi_message(piano, &[0x90, 60, 127]).unwrap();
    assert_eq!(session.tick(0.1).matched.len(), 1);
    assert!(recorded.borrow().synced.is_empty());

    set_now(31_000.0);
    session.tick(0.1);
    {
        let recorded = recorded.borrow();
        assert_eq!(recorded.synced.len(), 1);
        assert_eq!(recorded.synced[0].0, "run-1000-1");
        assert_eq!(recorded.synced[0].1.len(), 1);
    }

    session.midi_message(piano, &[0x90, 62, 127]).unwrap();
    session.midi_message(piano, &[0x90, 64, 127]).unwrap();
    assert!(run_until_completed(&mut session, 100).is_some());

    let recorded = recorded.borrow();
    assert_eq!(recorded.synced.len(), 1);
    assert_eq!(recorded.saved.len(), 1);
    let (record, remainder) = &recorded.saved[0];
    assert_eq!(record.user_id, "user-7");
    assert_eq!(record.song_title, "Etude");
    assert_eq!(record.start_time, 1_000.0);
    assert_eq!(record.end_time, 31_000.0);
    assert_eq!(record.total_notes, 3);
    assert_eq!(record.accuracy, 100);
    assert_eq!(record.average_velocity, 1.0);

    let flushed: Vec<u8> = remainder.iter().map(|e| e.pitch).collect();
    assert_eq!(flushed, vec![62, 64]);

    assert_eq!(session.last_session_id(), Some("session-1"));
    assert_eq!(session.log_entries().len(), 3);
}

#[test]
fn nothing_is_sent_without_a_user() {
    init();
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let mut session = scale_session();
    session.set_store(Box::new(FakeStore(recorded.clone())));
    session.start();

    session.key_down("q");
    session.key_down("w");
    session.key_down("e");
    set_now(60_000.0);
    assert!(run_until_completed(&mut session, 100).is_some());

    let recorded = recorded.borrow();
    assert!(recorded.synced.is_empty());
    assert!(recorded.saved.is_empty());
    assert_eq!(session.stats().correct_notes, 3);
    assert!(session.last_session_id().is_none());
}

#[test]
fn persistence_failures_do_not_stop_the_run() {
    init();
    let recorded = Rc::new(RefCell::new(Recorded {
        offline: true,
        ..Recorded::default()
    }));
    let mut session = scale_session();
    session.set_store(Box::new(FakeStore(recorded.clone())));
    session.sign_in("user-7");
    session.start();

    session.key_down("q");
    session.tick(0.1);
    set_now(40_000.0);
    session.key_down("w");
    session.key_down("e");

    let tick = run_until_completed(&mut session, 100).expect("run should finish");
    assert_eq!(tick.snapshot.state, GameState::Finished);
    assert!(session.last_session_id().is_none());
    assert_eq!(session.log_entries().len(), 3);
    assert!(recorded.borrow().saved.is_empty());
}

#[test]
fn musicxml_score_plays_from_the_keyboard() {
    init();
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <movement-title>Three Steps</movement-title>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>"#;
    let model = ScoreModel::load(parse_musicxml(xml).unwrap()).unwrap();
    assert_eq!(model.title(), "Three Steps");
    assert_eq!(model.total_duration(), 1.5);

    let mut session = scale_session();
    session.load_score(model);
    session.start();
    for key in ["q", "w", "e"] {
        assert!(session.key_down(key));
    }
    assert!(run_until_completed(&mut session, 100).is_some());

    let stats = session.stats();
    assert_eq!(stats.total_notes, 3);
    assert_eq!(stats.accuracy, 100);
    let frame = session.frame();
    assert_eq!(frame.title, "Three Steps");
    assert_eq!(frame.snapshot.progress, 1.0);
}
