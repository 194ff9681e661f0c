//! Rhythm tracking: which parts of the hydration window saw meaningful intake.
//!
//! The wake-to-sleep window is split into five equal segments. Only actions
//! worth at least 120 ml count, so small corrective scrolls earn no credit.
//! Per-day tallies feed a 0-100 daily score (consistency + volume) and a
//! rolling seven-day mean.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::constants::*;
use crate::day::{DayKey, day_date};
use crate::pacing::WakeSleepWindow;
use crate::state::DaySummary;

/// Hit count and accumulated volume for one rhythm segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowTally {
    pub hits: u32,
    pub ml: u32,
}

/// Whether an action's volume is large enough to count.
pub fn is_meaningful(ml: u32) -> bool {
    ml >= MEANINGFUL_INTAKE_ML
}

/// Segment (0-4) of the day's window an event falls into.
///
/// Events at or after the window end land in the last segment; events before
/// its start (only possible for foreign boundaries) land in the first.
pub fn segment_index(event: NaiveDateTime, window: &WakeSleepWindow) -> usize {
    let date = day_date(event, window.wake());
    let (start, _) = window.bounds(date);
    let elapsed_secs = (event - start).num_seconds() as f64;
    let segment_secs = window.duration_minutes() as f64 * 60.0 / RHYTHM_SEGMENTS as f64;
    if elapsed_secs <= 0.0 || segment_secs <= 0.0 {
        return 0;
    }
    ((elapsed_secs / segment_secs).floor() as usize).min(RHYTHM_SEGMENTS - 1)
}

/// Credit one meaningful hit to a segment.
pub fn record_hit(windows: &mut [WindowTally; RHYTHM_SEGMENTS], segment: usize, ml: u32) {
    if let Some(tally) = windows.get_mut(segment) {
        tally.hits = tally.hits.saturating_add(1);
        tally.ml = tally.ml.saturating_add(ml);
    }
}

/// Take back a hit credited earlier, never going below zero.
pub fn reverse_hit(windows: &mut [WindowTally; RHYTHM_SEGMENTS], segment: usize, ml: u32) {
    if let Some(tally) = windows.get_mut(segment) {
        tally.hits = tally.hits.saturating_sub(1);
        tally.ml = tally.ml.saturating_sub(ml);
    }
}

/// Score breakdown for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DayScore {
    /// 0-70: weighted segments with at least one hit.
    pub consistency: u32,
    /// 0-30: volume tier reached.
    pub volume: u32,
}

impl DayScore {
    pub fn total(&self) -> u32 {
        self.consistency + self.volume
    }
}

pub fn volume_points(consumed_ml: u32, goal_ml: u32) -> u32 {
    if goal_ml == 0 {
        return 0;
    }
    let share = f64::from(consumed_ml) / f64::from(goal_ml);
    RHYTHM_VOLUME_TIERS
        .iter()
        .find(|(threshold, _)| share >= *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

pub fn day_score(windows: &[WindowTally; RHYTHM_SEGMENTS], consumed_ml: u32, goal_ml: u32) -> DayScore {
    let consistency = windows
        .iter()
        .zip(RHYTHM_SEGMENT_WEIGHTS.iter())
        .filter(|(tally, _)| tally.hits > 0)
        .map(|(_, weight)| *weight)
        .sum();
    DayScore {
        consistency,
        volume: volume_points(consumed_ml, goal_ml),
    }
}

/// Mean daily score over the seven calendar days ending at `today`.
///
/// Today is scored from its live tallies and the live total; earlier days use
/// their log entries. Days without an entry count as zero.
pub fn rolling_score(
    daily_log: &BTreeMap<DayKey, DaySummary>,
    today: &DayKey,
    today_consumed_ml: u32,
    today_goal_ml: u32,
) -> f64 {
    let mut sum = 0u32;
    for offset in 0..ROLLING_SCORE_DAYS {
        let Some(key) = today.days_before(offset) else {
            continue;
        };
        let score = match (offset, daily_log.get(&key)) {
            (0, Some(entry)) => day_score(&entry.windows, today_consumed_ml, today_goal_ml),
            (0, None) => day_score(&Default::default(), today_consumed_ml, today_goal_ml),
            (_, Some(entry)) => day_score(&entry.windows, entry.consumed_ml, entry.goal_ml),
            (_, None) => DayScore::default(),
        };
        sum += score.total();
    }
    f64::from(sum) / ROLLING_SCORE_DAYS as f64
}
