//! Day rollover: detecting a stale day and closing it out.
//!
//! A state is `Current` when its stored day key matches the key computed for
//! now, `Stale` otherwise. Going from stale to current snapshots the stored
//! day into the daily log (never overwriting a closed entry), prunes the log
//! to the retention window and resets the day's counters.
//!
//! The transition runs from three places: the self-renewing `RolloverTimer`,
//! foreground/resume events, and the first step of every mutation.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::time::Duration as StdDuration;

use super::consumption::{ConsumptionState, DayContext};
use crate::common::constants::{DAILY_LOG_RETENTION_DAYS, ROLLOVER_SAFETY_MARGIN_SECS};
use crate::day::{self, DayKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayStatus {
    Current,
    Stale { stored: DayKey, today: DayKey },
}

/// What a rollover did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverReport {
    /// The day that was closed, `None` for a state that was never stamped.
    pub closed_day: Option<DayKey>,
    pub today: DayKey,
    /// Final total of the closed day.
    pub consumed_ml: u32,
    /// False when the closed day already had a closed entry.
    pub snapshot_written: bool,
    pub pruned: usize,
}

impl ConsumptionState {
    /// A stored day later than today (clock moved back, wake moved later)
    /// stays current until the clock catches up.
    pub fn day_status(&self, ctx: &DayContext) -> DayStatus {
        let today = ctx.today();
        if self.day_key == today || (!self.day_key.is_unset() && self.day_key > today) {
            DayStatus::Current
        } else {
            DayStatus::Stale {
                stored: self.day_key.clone(),
                today,
            }
        }
    }

    /// Roll the state over to the current day if needed.
    pub fn ensure_current(&mut self, ctx: &DayContext) -> Option<RolloverReport> {
        let DayStatus::Stale { stored, today } = self.day_status(ctx) else {
            return None;
        };

        let consumed_ml = self.total_consumed();
        let (closed_day, snapshot_written) = if stored.is_unset() {
            (None, false)
        } else {
            let written = self.close_day(&stored, ctx.now);
            (Some(stored), written)
        };
        let pruned = self.prune_daily_log(&today, DAILY_LOG_RETENTION_DAYS as i64);

        self.day_key = today.clone();
        self.completed_bottles = 0;
        self.remaining = 1.0;
        self.carry_ml = 0;
        self.extra_ml = 0;
        self.history.clear();
        self.celebrate = None;

        Some(RolloverReport {
            closed_day,
            today,
            consumed_ml,
            snapshot_written,
            pruned,
        })
    }

    /// Write the day's final figures into its log entry unless already closed.
    fn close_day(&mut self, day: &DayKey, at: NaiveDateTime) -> bool {
        let consumed_ml = self.total_consumed();
        let (goal_ml, bottle_ml, carry_ml, extra_ml) =
            (self.goal_ml, self.bottle_ml, self.carry_ml, self.extra_ml);

        let entry = self.daily_log.entry(day.clone()).or_default();
        if entry.is_closed() {
            return false;
        }
        entry.consumed_ml = consumed_ml;
        entry.goal_ml = goal_ml;
        entry.bottle_ml = bottle_ml;
        entry.carry_ml = carry_ml;
        entry.extra_ml = extra_ml;
        entry.closed_at = Some(at);
        true
    }

    /// Drop log entries older than the `keep_days` days ending at `today`.
    /// Returns how many were evicted.
    pub fn prune_daily_log(&mut self, today: &DayKey, keep_days: i64) -> usize {
        let Some(cutoff) = today.days_before(keep_days - 1) else {
            return 0;
        };
        let before = self.daily_log.len();
        self.daily_log.retain(|key, _| *key >= cutoff);
        before - self.daily_log.len()
    }
}

/// Deadline for the next automatic rollover check.
///
/// Always rescheduled after firing and whenever the wake time changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverTimer {
    due_at: Option<NaiveDateTime>,
}

impl RolloverTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer for the next boundary crossing after `now`, plus a small margin.
    pub fn schedule(&mut self, now: NaiveDateTime, boundary_minutes: i64) -> NaiveDateTime {
        let until = day::time_until_next_boundary(now, boundary_minutes)
            + StdDuration::from_secs(ROLLOVER_SAFETY_MARGIN_SECS);
        let due = now + ChronoDuration::from_std(until).unwrap_or(ChronoDuration::days(1));
        self.due_at = Some(due);
        due
    }

    pub fn due_at(&self) -> Option<NaiveDateTime> {
        self.due_at
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.due_at.is_some_and(|due| now >= due)
    }

    /// Time left until the deadline, zero when due or unarmed.
    pub fn remaining(&self, now: NaiveDateTime) -> StdDuration {
        self.due_at
            .and_then(|due| (due - now).to_std().ok())
            .unwrap_or(StdDuration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::WakeSleepWindow;
    use crate::state::Action;
    use chrono::NaiveDate;

    fn ctx(day: u32, h: u32, m: u32) -> DayContext {
        let now = NaiveDate::from_ymd_opt(2026, 9, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        DayContext::new(now, WakeSleepWindow::new(420, 1380))
    }

    #[test]
    fn test_first_stamp_writes_no_snapshot() {
        let mut state = ConsumptionState::new(2000, 500);
        let report = state.ensure_current(&ctx(1, 9, 0)).unwrap();
        assert_eq!(report.closed_day, None);
        assert!(state.daily_log.is_empty());
        assert_eq!(state.day_key.as_str(), "2026-09-01");
        assert!(state.ensure_current(&ctx(1, 22, 0)).is_none());
    }

    #[test]
    fn test_rollover_between_calls_resets_and_logs_once() {
        let mut state = ConsumptionState::new(2000, 500);
        state.set_bottle_level(0.0, Action::Track, &ctx(1, 9, 0));
        state.set_bottle_level(0.5, Action::Adjust, &ctx(1, 13, 0));
        state.add_extra(200, &ctx(1, 20, 0));
        assert_eq!(state.total_consumed(), 950);

        // 06:59 next morning is still the same day under a 07:00 boundary
        assert_eq!(state.day_status(&ctx(2, 6, 59)), DayStatus::Current);

        let outcome = state.add_extra(100, &ctx(2, 7, 30));
        let report = outcome.rollover.unwrap();
        assert_eq!(report.closed_day.unwrap().as_str(), "2026-09-01");
        assert_eq!(report.consumed_ml, 950);
        assert!(report.snapshot_written);

        assert_eq!(state.completed_bottles, 0);
        assert_eq!(state.remaining, 1.0);
        assert_eq!(state.carry_ml, 0);
        assert_eq!(state.extra_ml, 100);
        assert_eq!(state.history.len(), 1);

        let closed: Vec<_> = state
            .daily_log
            .iter()
            .filter(|(_, entry)| entry.is_closed())
            .collect();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].1.consumed_ml, 950);
        // All three actions were meaningful and credited to the closed day
        let hits: u32 = closed[0].1.windows.iter().map(|w| w.hits).sum();
        assert_eq!(hits, 3);
    }

    #[test]
    fn test_closed_entry_is_never_overwritten() {
        let mut state = ConsumptionState::new(2000, 500);
        state.ensure_current(&ctx(1, 9, 0));
        state.add_extra(700, &ctx(1, 10, 0));
        let closed = state.clone();
        state.ensure_current(&ctx(2, 9, 0));

        // An older snapshot of day 1 resurfaces next to the closed entry
        let first_day = DayKey::from_date(ctx(1, 9, 0).now.date());
        let mut resurfaced = closed;
        resurfaced.extra_ml = 750;
        resurfaced
            .daily_log
            .insert(first_day.clone(), state.daily_log[&first_day].clone());

        let report = resurfaced.ensure_current(&ctx(2, 9, 30)).unwrap();
        assert!(!report.snapshot_written);
        assert_eq!(resurfaced.daily_log[&first_day].consumed_ml, 700);
    }

    #[test]
    fn test_clock_moving_back_keeps_the_later_day() {
        let mut state = ConsumptionState::new(2000, 500);
        state.ensure_current(&ctx(2, 9, 0));
        state.add_extra(300, &ctx(2, 9, 30));

        assert_eq!(state.day_status(&ctx(1, 12, 0)), DayStatus::Current);
        assert!(state.ensure_current(&ctx(1, 12, 0)).is_none());
        assert_eq!(state.day_key.as_str(), "2026-09-02");
        assert_eq!(state.extra_ml, 300);
    }

    #[test]
    fn test_daily_log_is_pruned_to_retention() {
        let mut state = ConsumptionState::new(2000, 500);
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        for offset in 0..(DAILY_LOG_RETENTION_DAYS as i64 + 5) {
            let now = (start + ChronoDuration::days(offset)).and_hms_opt(12, 0, 0).unwrap();
            let day_ctx = DayContext::new(now, WakeSleepWindow::new(420, 1380));
            state.add_extra(300, &day_ctx);
        }
        assert!(state.daily_log.len() <= DAILY_LOG_RETENTION_DAYS);
        let oldest = state.daily_log.keys().next().unwrap().clone();
        assert!(oldest > DayKey::from_date(start + ChronoDuration::days(4)));
    }

    #[test]
    fn test_timer_is_self_renewing() {
        let mut timer = RolloverTimer::new();
        assert!(!timer.is_due(ctx(1, 9, 0).now));

        let due = timer.schedule(ctx(1, 9, 0).now, 420);
        assert_eq!(due, ctx(2, 7, 0).now + ChronoDuration::seconds(2));
        assert!(!timer.is_due(ctx(2, 7, 0).now));
        assert!(timer.is_due(due));

        let next = timer.schedule(due, 420);
        assert_eq!(next, ctx(3, 7, 0).now + ChronoDuration::seconds(2));
        assert_eq!(timer.remaining(ctx(3, 7, 0).now), StdDuration::from_secs(2));
    }
}
