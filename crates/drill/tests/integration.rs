//! Integration tests for drill
//!
//! These tests verify the end-to-end flow from a session script on disk to
//! a saved, archived and exported session.

use chrono::{Local, NaiveDate, TimeZone};
use drill_core::{
    Difficulty, EventCode, EventLog, Feedback, SessionResult, SessionStatus, TickOutcome,
    TimerEngine,
};
use drill_script::{find_today_session, load_script, parse_and_validate, ScriptError, TodaySession};
use drill_store::{export_json, FileArchive, RunSummary, SessionArchive, SqliteStore, Store};
use drill_util::{Clock, ManualClock};
use std::path::PathBuf;
use std::sync::Arc;

const LEG_DAY: &str = r#"{
    "session_id": "W01-D1",
    "session_name": "Leg Day",
    "total_steps": 3,
    "steps": [
        {"step_no": 1, "action_name": "March in place", "action_type": "timed",
         "sets": 1, "target_seconds": 3, "rest_seconds": 0, "phase": "warmup"},
        {"step_no": 2, "action_name": "Squat", "action_type": "reps",
         "sets": 2, "target_reps": 12, "rest_seconds": 2, "phase": "main"},
        {"step_no": 3, "action_name": "Wall sit", "action_type": "timed",
         "sets": 2, "target_seconds": 2, "rest_seconds": 1, "phase": "cooldown"}
    ]
}"#;

fn make_engine() -> (TimerEngine, Arc<ManualClock>) {
    let script = parse_and_validate(LEG_DAY).unwrap();
    let clock = Arc::new(ManualClock::new(
        Local.with_ymd_and_hms(2025, 12, 29, 7, 0, 0).unwrap(),
    ));
    (TimerEngine::with_clock(script, clock.clone()), clock)
}

fn tick(engine: &mut TimerEngine, clock: &ManualClock) -> TickOutcome {
    clock.advance_secs(1);
    engine.tick()
}

/// Run the whole script without skipping anything
fn run_to_completion(engine: &mut TimerEngine, clock: &ManualClock) {
    engine.start_session();

    // Warm-up: 3 seconds
    for _ in 0..3 {
        tick(engine, clock);
    }

    // Squats: two confirmed sets with a rest between
    assert!(engine.complete_rep_set());
    while engine.state().is_resting {
        tick(engine, clock);
    }
    assert!(engine.complete_rep_set());

    // Wall sit: 2s, rest 1s, 2s
    let mut guard = 0;
    while !engine.is_terminal() {
        tick(engine, clock);
        guard += 1;
        assert!(guard < 20, "session did not complete");
    }
}

#[test]
fn test_full_session_completes() {
    let (mut engine, clock) = make_engine();
    run_to_completion(&mut engine, &clock);

    assert_eq!(engine.status(), SessionStatus::Completed);
    assert_eq!(engine.completed_step_numbers(), vec![1, 2, 3]);
    assert_eq!(engine.state().completed_sets, 5);
    assert_eq!(
        engine.event_log().codes(),
        vec![
            EventCode::RestStart,
            EventCode::RestEnd,
            EventCode::RestStart,
            EventCode::RestEnd,
            EventCode::SessionComplete,
        ]
    );

    // 3s warm-up, 2s squat rest, 2s + 1s + 2s wall sit
    let result = engine.build_session_result(&Feedback::new(Difficulty::JustRight, 6));
    assert_eq!(result.duration_seconds, 10);
    assert_eq!(result.planned_sets, 5);
    assert_eq!(result.completed_sets, 5);
    assert!(!result.ended_early);
}

#[test]
fn test_early_end_then_save_and_reload() {
    let (mut engine, clock) = make_engine();
    engine.start_session();
    tick(&mut engine, &clock);
    engine.pause();
    clock.advance_secs(30);
    engine.resume();
    engine.skip();
    engine.end_session();

    let prompts = engine.feedback_prompts();
    assert!(prompts.skip_reason_required);
    assert!(prompts.end_reason_required);

    let feedback = Feedback::new(Difficulty::TooHard, 9)
        .with_skip_reason("dizzy")
        .with_end_reason("dizzy");
    engine.submit_feedback(&feedback);

    let archive =
        SessionArchive::from_engine(&engine, &feedback, Some(PathBuf::from("leg_day.json")));
    assert!(archive.result.ended_early);
    assert_eq!(archive.result.ended_on_step_no, Some(2));
    assert_eq!(archive.result.ended_on_action_name.as_deref(), Some("Squat"));
    assert_eq!(archive.result.duration_seconds, 31);
    assert!(archive.completed_steps.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("drill.db")).unwrap();
    store.save_session(&archive).unwrap();

    let loaded = store.load_last_session().unwrap().unwrap();
    assert_eq!(loaded, archive);
    assert_eq!(
        loaded.event_logs.codes(),
        vec![
            EventCode::Pause,
            EventCode::Resume,
            EventCode::Skip,
            EventCode::EndSession,
            EventCode::PostFeedbackSubmit,
        ]
    );
}

#[test]
fn test_archive_and_export_layout() {
    let (mut engine, clock) = make_engine();
    engine.start_session();
    engine.skip();
    engine.complete_rep_set();
    tick(&mut engine, &clock);
    tick(&mut engine, &clock);
    engine.complete_rep_set();
    engine.end_session();

    let feedback = Feedback::new(Difficulty::JustRight, 5).with_skip_reason("skipped warm-up");
    engine.submit_feedback(&feedback);
    let archive = SessionArchive::from_engine(&engine, &feedback, None);

    let dir = tempfile::tempdir().unwrap();
    let files = FileArchive::new(dir.path())
        .write(&archive, "20251229_070000")
        .unwrap();

    assert!(files
        .exported
        .session_result_path
        .ends_with("inbox/20251229_070000__leg_day__session_result.json"));
    assert!(files
        .run_file_path
        .ends_with("runs/run_20251229_070000_w01-d1.json"));

    let run: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(&files.run_file_path).unwrap()).unwrap();
    assert_eq!(run.completed_steps, vec![2]);
    assert_eq!(run.skipped_steps, vec![1]);
    assert_eq!(run.session_file_path, None);

    let exported = export_json(dir.path().join("export"), &archive.result, &archive.event_logs)
        .unwrap();
    let result: SessionResult =
        serde_json::from_str(&std::fs::read_to_string(&exported.session_result_path).unwrap())
            .unwrap();
    let events: EventLog =
        serde_json::from_str(&std::fs::read_to_string(&exported.event_logs_path).unwrap())
            .unwrap();
    assert_eq!(result, archive.result);
    assert_eq!(events, archive.event_logs);
}

#[test]
fn test_event_timestamps_follow_clock() {
    let (mut engine, clock) = make_engine();
    engine.start_session();
    clock.advance_secs(2);
    engine.pause();

    let record = engine.event_log().last().unwrap();
    assert_eq!(record.timestamp, clock.now());
    assert_eq!(
        engine.state().started_at,
        Some(Local.with_ymd_and_hms(2025, 12, 29, 7, 0, 0).unwrap())
    );
}

#[test]
fn test_today_session_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 12, 29).unwrap();

    assert!(matches!(
        find_today_session(dir.path(), day),
        TodaySession::NoSessionForToday
    ));

    // 2025-12-29 is a Monday in ISO week 2026-W01
    let week = dir.path().join("week2026_01");
    std::fs::create_dir_all(&week).unwrap();
    std::fs::write(week.join("session_20251229_legs.json"), LEG_DAY).unwrap();

    match find_today_session(dir.path(), day) {
        TodaySession::Found { path, script } => {
            assert!(path.ends_with("session_20251229_legs.json"));
            assert_eq!(script.session_name, "Leg Day");
        }
        other => panic!("expected a session, got {:?}", other),
    }
}

#[test]
fn test_invalid_script_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, LEG_DAY.replace("\"total_steps\": 3", "\"total_steps\": 4")).unwrap();

    assert!(matches!(load_script(&path), Err(ScriptError::Invalid(_))));

    std::fs::write(&path, "{ not json").unwrap();
    let err = load_script(&path).unwrap_err();
    assert_eq!(err.kind(), "MALFORMED_INPUT");
}
