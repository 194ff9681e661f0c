//! End-to-end scenarios over `HydrationSession` with a simulated clock.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use hydrated::HydrationSession;
use hydrated::config::Config;
use hydrated::day::DayKey;
use hydrated::logger::Log;
use hydrated::state::CelebrationKind;
use hydrated::store::{FileStore, MemoryStore};
use hydrated::testing::RecordingNotifier;
use hydrated::time_source::SimulatedTimeSource;

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 9, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn key(day: u32) -> DayKey {
    DayKey::from_date(NaiveDate::from_ymd_opt(2026, 9, day).unwrap())
}

// Wake 08:00, sleep 22:00, goal 2000 ml, 500 ml bottle
fn config() -> Config {
    Config {
        wake: Some("08:00".to_string()),
        sleep: Some("22:00".to_string()),
        goal_ml: Some(2000),
        bottle_ml: Some(500),
        ..Default::default()
    }
}

fn session(
    now: NaiveDateTime,
    config: Config,
    notifier: RecordingNotifier,
) -> (HydrationSession, Arc<SimulatedTimeSource>) {
    Log::set_enabled(false);
    let clock = Arc::new(SimulatedTimeSource::at(now));
    let session = HydrationSession::new(
        config,
        Box::new(MemoryStore::new()),
        Box::new(notifier),
        clock.clone(),
    );
    (session, clock)
}

#[test]
fn test_days_away_close_only_the_last_tracked_day() {
    let (mut session, clock) = session(at(10, 10, 0), config(), RecordingNotifier::new());
    session.on_foreground();
    session.track(50.0);
    session.add_extra(300);
    assert_eq!(session.state().total_consumed(), 550);

    clock.advance(ChronoDuration::days(3));
    let report = session.on_foreground().expect("stale day should roll over");

    assert_eq!(report.closed_day, Some(key(10)));
    assert_eq!(report.today, key(13));
    assert_eq!(report.consumed_ml, 550);
    assert_eq!(session.state().total_consumed(), 0);
    assert_eq!(session.state().remaining, 1.0);
    assert!(session.state().history.is_empty());

    let closed = &session.state().daily_log[&key(10)];
    assert_eq!(closed.consumed_ml, 550);
    assert!(closed.is_closed());
    // Both intakes landed in the first fifth of the day
    assert_eq!(closed.windows[0].hits, 2);
    assert_eq!(closed.windows[0].ml, 550);
    assert!(!session.state().daily_log.contains_key(&key(11)));

    // One segment (18) and no volume points, averaged over seven days
    assert!((session.rolling_score() - 18.0 / 7.0).abs() < 1e-9);
    assert!(session.on_foreground().is_none());
}

#[test]
fn test_undo_after_rollover_does_not_reach_into_yesterday() {
    let (mut session, clock) = session(at(10, 21, 0), config(), RecordingNotifier::new());
    session.track(40.0);
    assert_eq!(session.state().total_consumed(), 300);

    clock.set(at(11, 9, 0));
    let outcome = session.undo();

    assert!(outcome.rollover.is_some());
    assert!(!outcome.changed);
    assert_eq!(session.state().daily_log[&key(10)].consumed_ml, 300);
    assert_eq!(session.state().total_consumed(), 0);
}

#[test]
fn test_goal_is_celebrated_and_the_total_capped() {
    let mut goal_of_two_bottles = config();
    goal_of_two_bottles.goal_ml = Some(1000);
    let (mut session, _clock) =
        session(at(10, 12, 0), goal_of_two_bottles, RecordingNotifier::new());

    let first = session.track(0.0);
    assert_eq!(first.celebration.map(|c| c.kind), Some(CelebrationKind::Bottle));

    let second = session.track(0.0);
    let celebration = second.celebration.expect("goal reached");
    assert_eq!(celebration.kind, CelebrationKind::Goal);
    assert_eq!(celebration.consumed_ml, 1000);
    assert_eq!(session.status().percent, 100);

    session.track(0.0);
    assert_eq!(session.state().completed_bottles, 2);
    assert_eq!(session.state().total_consumed(), 1000);
}

#[test]
fn test_praise_when_ahead_of_pace() {
    let notifier = RecordingNotifier::new();
    let (mut session, clock) = session(at(10, 13, 0), config(), notifier.clone());
    session.on_foreground();

    // 814 ml expected at 13:00; two bottles puts the day ahead
    session.track(0.0);
    session.track(0.0);
    session.deliver_due();

    let delivered = notifier.delivered();
    assert_eq!(notifier.delivered_ids(), vec!["praise".to_string()]);
    assert_eq!(delivered[0].title, "Ahead of pace");
    assert!(session.tokens().praised_on(&key(10)));

    // Once a day
    clock.advance(ChronoDuration::hours(1));
    session.track(0.0);
    session.deliver_due();
    assert_eq!(notifier.delivered_ids().len(), 1);
}

#[test]
fn test_falling_behind_schedules_the_early_nudge() {
    let notifier = RecordingNotifier::new();
    let (mut session, clock) = session(at(10, 9, 0), config(), notifier.clone());
    session.on_foreground();
    session.acknowledge_morning_reset();

    // Nothing drunk: remind at the quarter mark
    assert_eq!(notifier.pending_at("nudge-early"), Some(at(10, 11, 30)));
    assert_eq!(notifier.pending_at("nudge-late"), Some(at(10, 17, 48)));
    assert!(notifier.pending_at("morning-reset").is_none());

    clock.set(at(10, 11, 30));
    session.tick();
    assert_eq!(notifier.delivered_ids(), vec!["nudge-early".to_string()]);
    assert!(session.tokens().early_fired_on(&key(10)));

    // Logging after the reminder stands down the late one
    clock.set(at(10, 11, 40));
    session.add_extra(200);
    assert!(notifier.pending_at("nudge-late").is_none());
}

#[test]
fn test_denied_permission_schedules_nothing() {
    let notifier = RecordingNotifier::with_permission(false);
    let (mut session, clock) = session(at(10, 9, 0), config(), notifier.clone());
    session.on_foreground();
    assert!(!session.notifications_allowed());

    clock.set(at(10, 20, 0));
    session.tick();
    assert!(notifier.pending().is_empty());
    assert!(notifier.delivered().is_empty());
    // The prompt still shows up in the status
    assert!(session.status().morning_reset_pending);
}

#[test]
fn test_bottle_change_from_config_keeps_the_total() {
    let (mut session, _clock) = session(at(10, 12, 0), config(), RecordingNotifier::new());
    session.track(0.0);
    session.track(40.0);
    assert_eq!(session.state().total_consumed(), 800);

    let mut bigger = config();
    bigger.bottle_ml = Some(750);
    session.apply_config(bigger);

    let state = session.state();
    assert_eq!(state.bottle_ml, 750);
    assert_eq!(state.carry_ml, 800);
    assert_eq!(state.remaining, 1.0);
    assert_eq!(state.total_consumed(), 800);
}

#[test]
fn test_state_is_shared_through_the_state_directory() {
    Log::set_enabled(false);
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(SimulatedTimeSource::at(at(10, 10, 0)));

    {
        let mut first = HydrationSession::new(
            config(),
            Box::new(FileStore::new(dir.path())),
            Box::new(RecordingNotifier::new()),
            clock.clone(),
        );
        first.track(40.0);
        first.on_background();
    }

    clock.advance(ChronoDuration::minutes(5));
    let mut second = HydrationSession::new(
        config(),
        Box::new(FileStore::new(dir.path())),
        Box::new(RecordingNotifier::new()),
        clock.clone(),
    );
    assert_eq!(second.state().remaining, 0.4);
    assert_eq!(second.state().total_consumed(), 300);

    // Undo history travels with the state
    assert!(second.undo().changed);
    assert_eq!(second.state().remaining, 1.0);
    assert!(!second.state().daily_log.contains_key(&key(10)));
}
