//! The authoritative record of today's progress and the operations that change it.
//!
//! Every mutation follows the same order: make sure the state belongs to the
//! current day (rolling over first if it does not), capture the values about to
//! be overwritten into the undo history, apply the change, credit the rhythm
//! window, then decide whether the result deserves a celebration.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::history::{self, Action, HistoryEntry, RhythmAttribution};
use super::rollover::RolloverReport;
use crate::common::constants::*;
use crate::day::{self, DayKey};
use crate::pacing::WakeSleepWindow;
use crate::rhythm::{self, WindowTally};

/// The instant and schedule a mutation is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayContext {
    pub now: NaiveDateTime,
    pub window: WakeSleepWindow,
}

impl DayContext {
    pub fn new(now: NaiveDateTime, window: WakeSleepWindow) -> Self {
        Self { now, window }
    }

    /// The day starts at wake time.
    pub fn boundary_minutes(&self) -> i64 {
        self.window.wake()
    }

    pub fn today(&self) -> DayKey {
        day::day_key(self.now, self.boundary_minutes())
    }
}

/// One day's entry in the daily log.
///
/// While the day is live only `windows` is filled in; the rollover writes the
/// final figures and stamps `closed_at`, after which the entry never changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaySummary {
    #[serde(rename = "consumedML")]
    pub consumed_ml: u32,
    #[serde(rename = "goalML")]
    pub goal_ml: u32,
    #[serde(rename = "bottleML")]
    pub bottle_ml: u32,
    #[serde(rename = "carryML")]
    pub carry_ml: u32,
    #[serde(rename = "extraML")]
    pub extra_ml: u32,
    pub windows: [WindowTally; RHYTHM_SEGMENTS],
    pub closed_at: Option<NaiveDateTime>,
}

impl DaySummary {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CelebrationKind {
    /// Daily goal reached.
    Goal,
    /// A bottle was finished through an explicit track action.
    Bottle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Celebration {
    pub kind: CelebrationKind,
    pub percent: u32,
    pub consumed_ml: u32,
}

/// Side effects of one mutation, for the session to log and react to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    pub rollover: Option<RolloverReport>,
    pub celebration: Option<Celebration>,
    pub attribution: Option<RhythmAttribution>,
    /// False for no-ops (e.g. undo with an empty history).
    pub changed: bool,
}

/// Today's progress, persisted as one flat JSON snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumptionState {
    pub day_key: DayKey,
    #[serde(rename = "bottleML")]
    pub bottle_ml: u32,
    #[serde(rename = "goalML")]
    pub goal_ml: u32,
    pub completed_bottles: u32,
    /// Fraction of the current bottle still full.
    pub remaining: f64,
    #[serde(rename = "carryML")]
    pub carry_ml: u32,
    #[serde(rename = "extraML")]
    pub extra_ml: u32,
    pub daily_log: BTreeMap<DayKey, DaySummary>,
    pub history: Vec<HistoryEntry>,
    pub celebrate: Option<Celebration>,
}

impl Default for ConsumptionState {
    fn default() -> Self {
        Self::new(DEFAULT_GOAL_ML, DEFAULT_BOTTLE_ML)
    }
}

impl ConsumptionState {
    pub fn new(goal_ml: u32, bottle_ml: u32) -> Self {
        Self {
            day_key: DayKey::default(),
            bottle_ml: bottle_ml.max(1),
            goal_ml: goal_ml.max(1),
            completed_bottles: 0,
            remaining: 1.0,
            carry_ml: 0,
            extra_ml: 0,
            daily_log: BTreeMap::new(),
            history: Vec::new(),
            celebrate: None,
        }
    }

    /// Pull a snapshot read from storage back inside its bounds.
    pub fn sanitized(mut self) -> Self {
        self.goal_ml = self.goal_ml.max(1);
        self.bottle_ml = self.bottle_ml.max(1);
        self.remaining = if self.remaining.is_finite() {
            self.remaining.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.completed_bottles = self.completed_bottles.min(self.bottle_cap());
        self.carry_ml = self.carry_ml.min(MAX_SIDE_VOLUME_ML);
        self.extra_ml = self.extra_ml.min(MAX_SIDE_VOLUME_ML);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
        self
    }

    /// Most bottles that can be credited in one day: `ceil(goal / bottle)`.
    pub fn bottle_cap(&self) -> u32 {
        self.goal_ml.div_ceil(self.bottle_ml.max(1))
    }

    /// Volume drunk from the current bottle.
    pub fn current_bottle_ml(&self) -> u32 {
        ((1.0 - self.remaining.clamp(0.0, 1.0)) * f64::from(self.bottle_ml)).round() as u32
    }

    /// Everything credited today, not clamped to the goal.
    pub fn raw_total_ml(&self) -> u64 {
        u64::from(self.completed_bottles) * u64::from(self.bottle_ml)
            + u64::from(self.current_bottle_ml())
            + u64::from(self.carry_ml)
            + u64::from(self.extra_ml)
    }

    /// Total consumed today, clamped to `[0, goal]`.
    pub fn total_consumed(&self) -> u32 {
        self.raw_total_ml().min(u64::from(self.goal_ml)) as u32
    }

    pub fn percent_of_goal(&self) -> u32 {
        if self.goal_ml == 0 {
            return 0;
        }
        (f64::from(self.total_consumed()) * 100.0 / f64::from(self.goal_ml)).round() as u32
    }

    /// Volume counted outside the current bottle (completed bottles, carry, extra).
    pub fn credited_outside_bottle(&self) -> u32 {
        let credited = u64::from(self.completed_bottles) * u64::from(self.bottle_ml)
            + u64::from(self.carry_ml)
            + u64::from(self.extra_ml);
        credited.min(u64::from(u32::MAX)) as u32
    }

    /// Rhythm tallies recorded so far for the active day.
    pub fn today_windows(&self) -> [WindowTally; RHYTHM_SEGMENTS] {
        self.daily_log
            .get(&self.day_key)
            .map(|entry| entry.windows)
            .unwrap_or_default()
    }

    fn history_entry(&self, at: NaiveDateTime, action: Action) -> HistoryEntry {
        HistoryEntry {
            at,
            remaining: self.remaining,
            completed_bottles: self.completed_bottles,
            carry_ml: self.carry_ml,
            extra_ml: self.extra_ml,
            action,
            attribution: None,
            celebrate: self.celebrate,
        }
    }

    /// Credit a meaningful intake to the rhythm window it happened in.
    fn attribute(&mut self, ctx: &DayContext, ml: u32) -> Option<RhythmAttribution> {
        if !rhythm::is_meaningful(ml) {
            return None;
        }
        let day = self.day_key.clone();
        let segment = rhythm::segment_index(ctx.now, &ctx.window);
        let created_entry = !self.daily_log.contains_key(&day);
        let (goal_ml, bottle_ml) = (self.goal_ml, self.bottle_ml);
        let entry = self.daily_log.entry(day.clone()).or_insert_with(|| DaySummary {
            goal_ml,
            bottle_ml,
            ..Default::default()
        });
        if entry.is_closed() {
            return None;
        }
        rhythm::record_hit(&mut entry.windows, segment, ml);
        Some(RhythmAttribution {
            day,
            segment,
            ml,
            created_entry,
        })
    }

    fn celebration_after(&self, bottle_completed: bool, action: Action) -> Option<Celebration> {
        let consumed_ml = self.total_consumed();
        let kind = if consumed_ml >= self.goal_ml {
            CelebrationKind::Goal
        } else if bottle_completed && action == Action::Track {
            CelebrationKind::Bottle
        } else {
            return None;
        };
        Some(Celebration {
            kind,
            percent: self.percent_of_goal(),
            consumed_ml,
        })
    }

    /// Set the current bottle's fill level.
    ///
    /// Dropping to empty from above completes the bottle: the completed count
    /// goes up (capped at `bottle_cap`) and the next bottle starts full.
    pub fn set_bottle_level(
        &mut self,
        fraction: f64,
        action: Action,
        ctx: &DayContext,
    ) -> MutationOutcome {
        let rollover = self.ensure_current(ctx);
        if !fraction.is_finite() {
            return MutationOutcome {
                rollover,
                ..Default::default()
            };
        }

        let level = fraction.clamp(0.0, 1.0);
        let mut entry = self.history_entry(ctx.now, action);
        let previous = self.remaining;

        let bottle_completed = previous > EMPTY_EPSILON && level <= EMPTY_EPSILON;
        let drunk_ml = if previous > level {
            ((previous - level) * f64::from(self.bottle_ml)).round() as u32
        } else {
            0
        };

        if bottle_completed {
            self.completed_bottles = (self.completed_bottles + 1).min(self.bottle_cap());
            self.remaining = 1.0;
        } else {
            self.remaining = level;
        }

        let attribution = self.attribute(ctx, drunk_ml);
        entry.attribution = attribution.clone();
        history::push_bounded(&mut self.history, entry);

        let celebration = self.celebration_after(bottle_completed, action);
        self.celebrate = celebration;

        MutationOutcome {
            rollover,
            celebration,
            attribution,
            changed: true,
        }
    }

    /// Log volume drunk outside the bottle. The bottle level is untouched.
    pub fn add_extra(&mut self, ml: u32, ctx: &DayContext) -> MutationOutcome {
        let rollover = self.ensure_current(ctx);
        let mut entry = self.history_entry(ctx.now, Action::Extra);

        let before = self.extra_ml;
        self.extra_ml = self.extra_ml.saturating_add(ml).min(MAX_SIDE_VOLUME_ML);
        let applied = self.extra_ml - before;

        let attribution = self.attribute(ctx, applied);
        entry.attribution = attribution.clone();
        history::push_bounded(&mut self.history, entry);

        let celebration = self.celebration_after(false, Action::Extra);
        self.celebrate = celebration;

        MutationOutcome {
            rollover,
            celebration,
            attribution,
            changed: true,
        }
    }

    /// Revert the most recent mutation, including its rhythm credit.
    pub fn undo(&mut self, ctx: &DayContext) -> MutationOutcome {
        let rollover = self.ensure_current(ctx);
        let Some(entry) = self.history.pop() else {
            return MutationOutcome {
                rollover,
                ..Default::default()
            };
        };

        self.remaining = entry.remaining;
        self.completed_bottles = entry.completed_bottles;
        self.carry_ml = entry.carry_ml;
        self.extra_ml = entry.extra_ml;
        self.celebrate = entry.celebrate;

        if let Some(attribution) = &entry.attribution
            && let Some(summary) = self.daily_log.get_mut(&attribution.day)
            && !summary.is_closed()
        {
            rhythm::reverse_hit(&mut summary.windows, attribution.segment, attribution.ml);
            let untouched = summary.windows.iter().all(|w| *w == WindowTally::default());
            if attribution.created_entry && untouched {
                self.daily_log.remove(&attribution.day);
            }
        }

        MutationOutcome {
            rollover,
            attribution: entry.attribution,
            changed: true,
            ..Default::default()
        }
    }

    /// Change the tracked bottle without changing today's total.
    ///
    /// All accumulated volume moves into `carry_ml`; the bottle cycle, extras
    /// and undo history start over.
    pub fn switch_bottle(&mut self, bottle_ml: u32, ctx: &DayContext) -> MutationOutcome {
        let rollover = self.ensure_current(ctx);
        let accumulated = self.raw_total_ml().min(u64::from(MAX_SIDE_VOLUME_ML)) as u32;

        self.bottle_ml = bottle_ml.max(1);
        self.carry_ml = accumulated;
        self.completed_bottles = 0;
        self.remaining = 1.0;
        self.extra_ml = 0;
        self.history.clear();
        self.celebrate = None;

        MutationOutcome {
            rollover,
            changed: true,
            ..Default::default()
        }
    }

    /// Commit the pending level as a track event, then start a full bottle.
    ///
    /// Whatever was drunk from the old bottle moves into `carry_ml` so the
    /// running total is unchanged by the refill itself.
    pub fn refill(&mut self, pending_fraction: f64, ctx: &DayContext) -> MutationOutcome {
        let outcome = self.set_bottle_level(pending_fraction, Action::Track, ctx);

        let accumulated = self.raw_total_ml();
        let outside_carry = u64::from(self.completed_bottles) * u64::from(self.bottle_ml)
            + u64::from(self.extra_ml);
        self.carry_ml = accumulated
            .saturating_sub(outside_carry)
            .min(u64::from(MAX_SIDE_VOLUME_ML)) as u32;
        self.remaining = 1.0;

        MutationOutcome {
            changed: true,
            ..outcome
        }
    }

    /// Change the daily goal, keeping the completed count within the new cap.
    pub fn set_goal(&mut self, goal_ml: u32, ctx: &DayContext) -> MutationOutcome {
        let rollover = self.ensure_current(ctx);
        self.goal_ml = goal_ml.max(1);
        self.completed_bottles = self.completed_bottles.min(self.bottle_cap());
        MutationOutcome {
            rollover,
            changed: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx(h: u32, m: u32) -> DayContext {
        let now = NaiveDate::from_ymd_opt(2026, 8, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        DayContext::new(now, WakeSleepWindow::new(480, 1320))
    }

    fn started(goal: u32, bottle: u32) -> ConsumptionState {
        let mut state = ConsumptionState::new(goal, bottle);
        state.ensure_current(&ctx(8, 0));
        state
    }

    #[test]
    fn test_four_tracked_bottles_reach_goal() {
        let mut state = started(2000, 500);
        let mut kinds = Vec::new();
        for i in 0..4 {
            let outcome = state.set_bottle_level(0.0, Action::Track, &ctx(9 + i, 0));
            kinds.push(outcome.celebration.map(|c| c.kind));
            assert_eq!(state.completed_bottles, i + 1);
            assert_eq!(state.remaining, 1.0);
        }
        assert_eq!(state.total_consumed(), 2000);
        assert_eq!(
            kinds,
            vec![
                Some(CelebrationKind::Bottle),
                Some(CelebrationKind::Bottle),
                Some(CelebrationKind::Bottle),
                Some(CelebrationKind::Goal),
            ]
        );
        assert_eq!(state.celebrate.unwrap().percent, 100);
    }

    #[test]
    fn test_adjust_completion_does_not_celebrate_bottle() {
        let mut state = started(2000, 500);
        let outcome = state.set_bottle_level(0.0, Action::Adjust, &ctx(9, 0));
        assert_eq!(state.completed_bottles, 1);
        assert!(outcome.celebration.is_none());
    }

    #[test]
    fn test_completed_bottles_are_capped() {
        let mut state = started(1200, 500);
        for _ in 0..5 {
            state.set_bottle_level(0.0, Action::Track, &ctx(10, 0));
        }
        assert_eq!(state.bottle_cap(), 3);
        assert_eq!(state.completed_bottles, 3);
        assert_eq!(state.total_consumed(), 1200);
    }

    #[test]
    fn test_add_extra_keeps_bottle_level() {
        let mut state = started(2000, 500);
        state.add_extra(250, &ctx(9, 0));
        assert_eq!(state.total_consumed(), 250);
        assert_eq!(state.remaining, 1.0);
    }

    #[test]
    fn test_extra_is_bounded() {
        let mut state = started(2000, 500);
        state.add_extra(MAX_SIDE_VOLUME_ML, &ctx(9, 0));
        state.add_extra(500, &ctx(9, 5));
        assert_eq!(state.extra_ml, MAX_SIDE_VOLUME_ML);
        assert_eq!(state.total_consumed(), 2000);
    }

    #[test]
    fn test_meaningful_intake_is_attributed_and_undone() {
        let mut state = started(2000, 500);
        let before = state.clone();

        let outcome = state.set_bottle_level(0.5, Action::Adjust, &ctx(9, 0));
        let attribution = outcome.attribution.unwrap();
        assert_eq!(attribution.segment, 0);
        assert_eq!(attribution.ml, 250);
        assert_eq!(state.today_windows()[0].hits, 1);

        state.undo(&ctx(9, 1));
        assert_eq!(state, before);
    }

    #[test]
    fn test_small_adjustment_is_not_attributed() {
        let mut state = started(2000, 500);
        let outcome = state.set_bottle_level(0.8, Action::Adjust, &ctx(9, 0));
        assert!(outcome.attribution.is_none());
        assert!(state.daily_log.is_empty());
    }

    #[test]
    fn test_undo_restores_the_previous_celebration() {
        let mut state = started(1000, 500);
        state.set_bottle_level(0.0, Action::Track, &ctx(10, 0));
        state.set_bottle_level(0.0, Action::Track, &ctx(11, 0));
        assert_eq!(state.celebrate.map(|c| c.kind), Some(CelebrationKind::Goal));

        let before = state.clone();
        state.add_extra(200, &ctx(12, 0));
        let outcome = state.undo(&ctx(12, 1));
        assert!(outcome.celebration.is_none());
        assert_eq!(state, before);

        // Undoing the goal-reaching bottle goes back to the bottle celebration
        state.undo(&ctx(12, 2));
        assert_eq!(state.celebrate.map(|c| c.kind), Some(CelebrationKind::Bottle));
    }

    #[test]
    fn test_undo_keeps_preexisting_log_entry() {
        let mut state = started(2000, 500);
        state.add_extra(300, &ctx(9, 0));
        let before = state.clone();
        state.add_extra(200, &ctx(15, 0));
        state.undo(&ctx(15, 1));
        assert_eq!(state, before);
        assert_eq!(state.today_windows()[0], WindowTally { hits: 1, ml: 300 });
    }

    #[test]
    fn test_undo_with_empty_history_is_noop() {
        let mut state = started(2000, 500);
        let before = state.clone();
        let outcome = state.undo(&ctx(9, 0));
        assert!(!outcome.changed);
        assert_eq!(state, before);
    }

    #[test]
    fn test_switch_bottle_preserves_total() {
        let mut state = started(3000, 500);
        state.set_bottle_level(0.0, Action::Track, &ctx(9, 0));
        state.set_bottle_level(0.4, Action::Adjust, &ctx(10, 0));
        state.add_extra(150, &ctx(11, 0));
        let total = state.total_consumed();
        assert_eq!(total, 500 + 300 + 150);

        state.switch_bottle(750, &ctx(12, 0));
        assert_eq!(state.total_consumed(), total);
        assert_eq!(state.carry_ml, total);
        assert_eq!(state.bottle_ml, 750);
        assert_eq!(state.completed_bottles, 0);
        assert_eq!(state.remaining, 1.0);
        assert_eq!(state.extra_ml, 0);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_refill_commits_pending_level_and_preserves_total() {
        let mut state = started(2000, 500);
        state.add_extra(100, &ctx(9, 0));
        state.refill(0.4, &ctx(10, 0));
        assert_eq!(state.remaining, 1.0);
        assert_eq!(state.carry_ml, 300);
        assert_eq!(state.total_consumed(), 400);

        // A single undo reverts the whole refill
        state.undo(&ctx(10, 1));
        assert_eq!(state.carry_ml, 0);
        assert_eq!(state.remaining, 1.0);
        assert_eq!(state.total_consumed(), 100);
    }

    #[test]
    fn test_set_goal_clamps_completed() {
        let mut state = started(3000, 500);
        for _ in 0..5 {
            state.set_bottle_level(0.0, Action::Adjust, &ctx(9, 0));
        }
        state.set_goal(1500, &ctx(10, 0));
        assert_eq!(state.completed_bottles, 3);
        assert_eq!(state.total_consumed(), 1500);
    }

    #[test]
    fn test_non_finite_level_is_ignored() {
        let mut state = started(2000, 500);
        let outcome = state.set_bottle_level(f64::NAN, Action::Adjust, &ctx(9, 0));
        assert!(!outcome.changed);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_snapshot_json_uses_flat_camel_case() {
        let state = started(2000, 500);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["goalML"], 2000);
        assert_eq!(json["bottleML"], 500);
        assert_eq!(json["completedBottles"], 0);
        assert_eq!(json["dayKey"], "2026-08-14");
    }
}
