//! Pacing model: how much of the daily goal "should" be gone by a given instant.
//!
//! Expected progress follows a front-loaded checkpoint curve over the wake/sleep
//! window instead of a straight line. The window duration is clamped to
//! [6h, 20h] when used as the denominator so misconfigured schedules still
//! produce sensible predictions.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::common::constants::*;

/// Ordered pair of minute-of-day offsets; `sleep <= wake` means sleep is on the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeSleepWindow {
    wake: i64,
    sleep: i64,
}

impl WakeSleepWindow {
    /// Build a window, normalizing wake into `[0, 1439]` and sleep into `[0, 2879]`.
    pub fn new(wake_minutes: i64, sleep_minutes: i64) -> Self {
        let wake = wake_minutes.rem_euclid(MINUTES_PER_DAY);
        let mut sleep = sleep_minutes.rem_euclid(MINUTES_PER_DAY);
        if sleep <= wake {
            sleep += MINUTES_PER_DAY;
        }
        Self { wake, sleep }
    }

    pub fn wake(&self) -> i64 {
        self.wake
    }

    pub fn sleep(&self) -> i64 {
        self.sleep
    }

    /// Real duration in minutes, always in `(0, 1440]`.
    pub fn duration_minutes(&self) -> i64 {
        self.sleep - self.wake
    }

    /// Duration used to turn elapsed minutes into window progress.
    pub fn pacing_denominator(&self) -> f64 {
        (self.duration_minutes() as f64).clamp(MIN_PACING_WINDOW_MINUTES, MAX_PACING_WINDOW_MINUTES)
    }

    /// Minutes elapsed since the most recent wake that still owns `now`.
    ///
    /// Negative before wake. For windows crossing midnight, times after
    /// midnight up to and including sleep count against the previous day's wake.
    pub fn elapsed_minutes(&self, now: NaiveDateTime) -> f64 {
        let minute_of_day =
            f64::from(now.hour() * 60 + now.minute()) + f64::from(now.second()) / 60.0;
        let mut elapsed = minute_of_day - self.wake as f64;
        if elapsed < 0.0 && minute_of_day + (MINUTES_PER_DAY as f64) <= self.sleep as f64 {
            elapsed += MINUTES_PER_DAY as f64;
        }
        elapsed
    }

    /// Share of the real window that has passed, clamped to `[0, 1]`.
    pub fn progress(&self, now: NaiveDateTime) -> f64 {
        let elapsed = self.elapsed_minutes(now);
        if elapsed <= 0.0 {
            return 0.0;
        }
        (elapsed / self.duration_minutes() as f64).min(1.0)
    }

    /// Wake and sleep instants for the window starting on `date`.
    pub fn bounds(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        (
            midnight + ChronoDuration::minutes(self.wake),
            midnight + ChronoDuration::minutes(self.sleep),
        )
    }

    /// The instant at which `fraction` of the window starting on `date` has elapsed.
    pub fn instant_at(&self, date: NaiveDate, fraction: f64) -> NaiveDateTime {
        let (start, _) = self.bounds(date);
        let seconds = (self.duration_minutes() as f64 * 60.0 * fraction.clamp(0.0, 1.0)).round();
        start + ChronoDuration::seconds(seconds as i64)
    }
}

/// Map window progress through the checkpoint curve, interpolating linearly
/// between checkpoints and from the origin to the first one.
pub fn checkpoint_curve(progress: f64) -> f64 {
    let progress = progress.clamp(0.0, 1.0);
    let mut previous = (0.0, 0.0);
    for &(x, y) in PACING_CHECKPOINTS.iter() {
        if progress <= x {
            let span = x - previous.0;
            if span <= 0.0 {
                return y;
            }
            return previous.1 + (progress - previous.0) / span * (y - previous.1);
        }
        previous = (x, y);
    }
    1.0
}

/// Fraction of the goal expected to be consumed at `now`.
pub fn expected_fraction(now: NaiveDateTime, wake_minutes: i64, sleep_minutes: i64) -> f64 {
    expected_fraction_in(now, &WakeSleepWindow::new(wake_minutes, sleep_minutes))
}

/// Same as [`expected_fraction`] for an already-built window.
pub fn expected_fraction_in(now: NaiveDateTime, window: &WakeSleepWindow) -> f64 {
    let elapsed = window.elapsed_minutes(now);
    if elapsed < 0.0 {
        return 0.0;
    }
    if elapsed >= window.duration_minutes() as f64 {
        return 1.0;
    }
    checkpoint_curve((elapsed / window.pacing_denominator()).min(1.0))
}

/// Volume of the goal expected to be consumed at `now`, rounded to whole ml.
pub fn expected_volume(goal_ml: u32, now: NaiveDateTime, window: &WakeSleepWindow) -> u32 {
    (f64::from(goal_ml) * expected_fraction_in(now, window)).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceDirection {
    Ahead,
    Behind,
}

/// Actual vs expected consumption at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacingStatus {
    pub direction: PaceDirection,
    /// Whether the gap exceeds the tolerance band.
    pub beyond_tolerance: bool,
    /// `actual - expected` in ml.
    pub delta_ml: i64,
    pub expected_ml: u32,
}

/// Tolerance band around the expected volume: `max(5% of goal, 150 ml)`.
pub fn pacing_tolerance_ml(goal_ml: u32) -> f64 {
    (f64::from(goal_ml) * PACING_TOLERANCE_FRACTION).max(PACING_TOLERANCE_MIN_ML)
}

/// Classify consumption against the expected volume.
///
/// Outside the tolerance band the direction follows the gap; inside it the raw
/// sign decides, with an exact tie counting as ahead.
pub fn pacing_status(actual_ml: u32, expected_ml: u32, goal_ml: u32) -> PacingStatus {
    let delta_ml = i64::from(actual_ml) - i64::from(expected_ml);
    let tolerance = pacing_tolerance_ml(goal_ml);
    let beyond_tolerance = (delta_ml as f64).abs() > tolerance;
    let direction = if delta_ml >= 0 {
        PaceDirection::Ahead
    } else {
        PaceDirection::Behind
    };
    PacingStatus {
        direction,
        beyond_tolerance,
        delta_ml,
        expected_ml,
    }
}

/// How many bottles the user trails the expected volume by (negative when ahead).
pub fn bottles_behind(actual_ml: u32, expected_ml: u32, bottle_ml: u32) -> f64 {
    if bottle_ml == 0 {
        return 0.0;
    }
    (f64::from(expected_ml) - f64::from(actual_ml)) / f64::from(bottle_ml)
}

/// Where the "drink down to here" line sits inside the current bottle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLinePolicy {
    /// Lowest fill fraction the line may show; also used whenever the user
    /// trails by a full bottle or more.
    pub floor: f64,
}

impl Default for TargetLinePolicy {
    fn default() -> Self {
        Self {
            floor: TARGET_LINE_FLOOR,
        }
    }
}

impl TargetLinePolicy {
    /// Fill fraction the current bottle should show now.
    ///
    /// `credited_ml` is everything already counted outside the current bottle
    /// (completed bottles, carry and extra volume).
    pub fn target_fill_fraction(&self, expected_ml: u32, credited_ml: u32, bottle_ml: u32) -> f64 {
        let due_ml = f64::from(expected_ml) - f64::from(credited_ml);
        if due_ml <= 0.0 || bottle_ml == 0 {
            return 1.0;
        }
        if due_ml >= f64::from(bottle_ml) {
            return self.floor;
        }
        (1.0 - due_ml / f64::from(bottle_ml)).clamp(self.floor, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_window_normalization() {
        let w = WakeSleepWindow::new(480, 1320);
        assert_eq!((w.wake(), w.sleep()), (480, 1320));

        let overnight = WakeSleepWindow::new(1200, 240);
        assert_eq!((overnight.wake(), overnight.sleep()), (1200, 1680));

        let wrapped = WakeSleepWindow::new(-60, 1500);
        assert_eq!((wrapped.wake(), wrapped.sleep()), (1380, 1500));
    }

    #[test]
    fn test_expected_fraction_endpoints() {
        assert_eq!(expected_fraction(at(8, 0), 480, 1320), 0.0);
        assert_eq!(expected_fraction(at(22, 0), 480, 1320), 1.0);
        assert_eq!(expected_fraction(at(7, 59), 480, 1320), 0.0);
        assert_eq!(expected_fraction(at(23, 30), 480, 1320), 1.0);
    }

    #[test]
    fn test_checkpoints_are_hit_exactly() {
        assert!((checkpoint_curve(0.25) - 0.30).abs() < 1e-12);
        assert!((checkpoint_curve(0.50) - 0.55).abs() < 1e-12);
        assert!((checkpoint_curve(0.70) - 0.75).abs() < 1e-12);
        assert!((checkpoint_curve(0.87) - 0.90).abs() < 1e-12);
        assert!((checkpoint_curve(0.125) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_expected_volume_mid_morning() {
        // 270 of 840 minutes elapsed: between the 25% and 50% checkpoints
        let window = WakeSleepWindow::new(480, 1320);
        let fraction = expected_fraction_in(at(12, 30), &window);
        assert!(fraction > 0.30 && fraction < 0.55);
        assert!((fraction - (0.30 + (270.0 / 840.0 - 0.25))).abs() < 1e-9);
        assert_eq!(expected_volume(2000, at(12, 30), &window), 743);
    }

    #[test]
    fn test_overnight_window_after_midnight() {
        // 20:00 -> 04:00; at 02:00 six of eight hours have passed
        let window = WakeSleepWindow::new(1200, 240);
        assert!((window.elapsed_minutes(at(2, 0)) - 360.0).abs() < 1e-9);
        assert!(expected_fraction_in(at(2, 0), &window) > 0.5);
        assert_eq!(expected_fraction_in(at(12, 0), &window), 0.0);
    }

    #[test]
    fn test_overnight_window_ends_full_at_sleep() {
        let window = WakeSleepWindow::new(1200, 240);
        let just_before = expected_fraction_in(at(3, 59), &window);
        assert!(just_before > 0.99 && just_before < 1.0);
        assert_eq!(expected_fraction(at(4, 0), 1200, 240), 1.0);
        assert_eq!(window.progress(at(4, 0)), 1.0);

        // Sleep exactly at midnight
        assert_eq!(expected_fraction(at(0, 0), 600, 0), 1.0);
    }

    #[test]
    fn test_short_window_uses_clamped_denominator() {
        // 4h window: denominator is 6h so progress tops out at 2/3 before sleep
        let window = WakeSleepWindow::new(600, 840);
        assert_eq!(window.pacing_denominator(), 360.0);
        let before_sleep = expected_fraction_in(at(13, 59), &window);
        assert!(before_sleep < 0.75);
        assert_eq!(expected_fraction_in(at(14, 0), &window), 1.0);
    }

    #[test]
    fn test_pacing_status_tolerance() {
        // goal 2000 -> tolerance 150 ml
        let ahead = pacing_status(900, 700, 2000);
        assert_eq!(ahead.direction, PaceDirection::Ahead);
        assert!(ahead.beyond_tolerance);

        let slightly_behind = pacing_status(650, 700, 2000);
        assert_eq!(slightly_behind.direction, PaceDirection::Behind);
        assert!(!slightly_behind.beyond_tolerance);

        let tie = pacing_status(700, 700, 2000);
        assert_eq!(tie.direction, PaceDirection::Ahead);
        assert!(!tie.beyond_tolerance);

        // goal 4000 -> tolerance 200 ml
        let big_goal = pacing_status(3000, 3180, 4000);
        assert!(!big_goal.beyond_tolerance);
    }

    #[test]
    fn test_target_line_policy() {
        let policy = TargetLinePolicy::default();
        assert_eq!(policy.target_fill_fraction(400, 500, 500), 1.0);
        assert!((policy.target_fill_fraction(750, 500, 500) - 0.5).abs() < 1e-12);
        assert_eq!(policy.target_fill_fraction(1200, 500, 500), TARGET_LINE_FLOOR);
        assert_eq!(policy.target_fill_fraction(990, 500, 500), TARGET_LINE_FLOOR);
    }

    #[test]
    fn test_instant_at_fraction() {
        let window = WakeSleepWindow::new(480, 1320);
        let date = at(0, 0).date();
        assert_eq!(window.instant_at(date, 0.25), at(11, 30));
        assert_eq!(window.instant_at(date, 1.0), at(22, 0));
    }
}
