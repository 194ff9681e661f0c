//! Behavioral nudges: when to remind, when to praise, when to stay quiet.
//!
//! Every decision here is a pure function of the current instant, today's
//! consumption and the per-day tokens. The session turns decisions into
//! calls on a [`NotificationService`]; ids are fixed per nudge kind so a
//! re-schedule replaces the earlier one.
//!
//! - Morning reset: a prompt the user dismisses to start the day.
//! - Early nudge: behind by 0.3 bottles at the 25% mark (or soon after).
//! - Late nudge: behind by 0.5 bottles at the 70% mark, unless the user
//!   already reacted to the early nudge.
//! - Praise: once a day, when on or ahead of pace with nothing nagged.

pub mod notifier;
pub mod tokens;

pub use notifier::{DesktopNotifier, DetachedNotifier, NotificationService};
pub use tokens::{NudgeTokens, morning_reset_token};

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};

use crate::common::constants::*;
use crate::day::{DayKey, day_date, day_key};
use crate::pacing::{WakeSleepWindow, bottles_behind, expected_volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeKind {
    MorningReset,
    Early,
    Late,
    Praise,
}

impl NudgeKind {
    pub fn id(&self) -> &'static str {
        match self {
            NudgeKind::MorningReset => NOTIFY_ID_MORNING_RESET,
            NudgeKind::Early => NOTIFY_ID_EARLY_NUDGE,
            NudgeKind::Late => NOTIFY_ID_LATE_NUDGE,
            NudgeKind::Praise => NOTIFY_ID_PRAISE,
        }
    }
}

/// A notification ready to hand to the notification service.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNudge {
    pub kind: NudgeKind,
    pub title: String,
    pub body: String,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NudgeDecision {
    Schedule(ScheduledNudge),
    /// Not eligible: cancel anything pending under this id.
    Withdraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PraiseTier {
    Neutral,
    Quantified,
}

/// Everything a nudge decision looks at besides the tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct NudgeInputs {
    pub now: NaiveDateTime,
    pub window: WakeSleepWindow,
    pub today: DayKey,
    pub goal_ml: u32,
    pub bottle_ml: u32,
    pub consumed_ml: u32,
}

impl NudgeInputs {
    fn window_date(&self) -> NaiveDate {
        day_date(self.now, self.window.wake())
    }

    fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.window.bounds(self.window_date())
    }

    fn checkpoint(&self, fraction: f64) -> NaiveDateTime {
        self.window.instant_at(self.window_date(), fraction)
    }

    /// Bottles behind the pace expected at `at`, measured against today's total.
    fn projected_behind(&self, at: NaiveDateTime) -> f64 {
        let expected = expected_volume(self.goal_ml, at, &self.window);
        bottles_behind(self.consumed_ml, expected, self.bottle_ml)
    }

    fn earliest_fire(&self) -> NaiveDateTime {
        self.now + ChronoDuration::minutes(NUDGE_MIN_LEAD_MINUTES)
    }
}

/// Whether the morning reset prompt still has to be shown today.
pub fn morning_reset_due(inputs: &NudgeInputs, tokens: &NudgeTokens) -> bool {
    let (wake_at, _) = inputs.bounds();
    inputs.now >= wake_at && !tokens.morning_reset_done(&inputs.today, inputs.window.wake())
}

pub fn morning_reset_prompt(inputs: &NudgeInputs, tokens: &NudgeTokens) -> NudgeDecision {
    if !morning_reset_due(inputs, tokens) {
        return NudgeDecision::Withdraw;
    }
    NudgeDecision::Schedule(ScheduledNudge {
        kind: NudgeKind::MorningReset,
        title: "New day, fresh bottle".to_string(),
        body: format!(
            "Yesterday is logged. Today's goal is {} ml. Confirm to start tracking.",
            inputs.goal_ml
        ),
        at: inputs.now,
    })
}

pub fn early_nudge(inputs: &NudgeInputs, tokens: &NudgeTokens) -> NudgeDecision {
    if tokens.early_fired_on(&inputs.today) {
        return NudgeDecision::Withdraw;
    }

    let (wake_at, _) = inputs.bounds();
    let at = inputs
        .earliest_fire()
        .max(wake_at + ChronoDuration::minutes(EARLY_NUDGE_MIN_AFTER_WAKE_MINUTES))
        .max(inputs.checkpoint(EARLY_NUDGE_WINDOW_FRACTION));
    // A fresh log holds the reminder back
    let at = match tokens.last_log_at {
        Some(logged) if day_key(logged, inputs.window.wake()) == inputs.today => {
            at.max(logged + ChronoDuration::minutes(EARLY_NUDGE_LOG_GRACE_MINUTES))
        }
        _ => at,
    };
    // Past the late checkpoint the late nudge takes over
    if at >= inputs.checkpoint(LATE_NUDGE_WINDOW_FRACTION) {
        return NudgeDecision::Withdraw;
    }

    let behind = inputs.projected_behind(at);
    if behind < EARLY_NUDGE_BEHIND_BOTTLES {
        return NudgeDecision::Withdraw;
    }

    let behind_ml = (behind * f64::from(inputs.bottle_ml)).round() as u32;
    NudgeDecision::Schedule(ScheduledNudge {
        kind: NudgeKind::Early,
        title: "Time for some water".to_string(),
        body: format!("You're about {behind_ml} ml behind your usual pace."),
        at,
    })
}

pub fn late_nudge(inputs: &NudgeInputs, tokens: &NudgeTokens) -> NudgeDecision {
    if tokens.late_fired_on(&inputs.today) {
        return NudgeDecision::Withdraw;
    }
    if tokens.early_fired_on(&inputs.today) && tokens.logged_since_early() {
        return NudgeDecision::Withdraw;
    }

    let (_, sleep_at) = inputs.bounds();
    let at = inputs
        .earliest_fire()
        .max(inputs.checkpoint(LATE_NUDGE_WINDOW_FRACTION));
    if at >= sleep_at {
        return NudgeDecision::Withdraw;
    }

    let behind = inputs.projected_behind(at);
    if behind < LATE_NUDGE_BEHIND_BOTTLES {
        return NudgeDecision::Withdraw;
    }

    NudgeDecision::Schedule(ScheduledNudge {
        kind: NudgeKind::Late,
        title: "Still catching up".to_string(),
        body: format!(
            "About {behind:.1} bottles behind. A few sips now keeps the evening easy."
        ),
        at,
    })
}

/// Praise tier for a lead of `lead_bottles` (leads between the two thresholds stay neutral).
pub fn praise_tier(lead_bottles: f64) -> PraiseTier {
    if lead_bottles >= PRAISE_QUANTIFIED_MIN_LEAD_BOTTLES {
        PraiseTier::Quantified
    } else {
        PraiseTier::Neutral
    }
}

/// Immediate praise, at most once per day.
pub fn praise(inputs: &NudgeInputs, tokens: &NudgeTokens) -> Option<ScheduledNudge> {
    let today = &inputs.today;
    if tokens.praised_on(today) || tokens.early_fired_on(today) || tokens.late_fired_on(today) {
        return None;
    }
    if !tokens.opened_on(today, inputs.window.wake()) {
        return None;
    }

    let progress = inputs.window.progress(inputs.now);
    if progress < PRAISE_MIN_WINDOW_FRACTION || progress >= 1.0 {
        return None;
    }

    let expected = expected_volume(inputs.goal_ml, inputs.now, &inputs.window);
    if inputs.consumed_ml < expected {
        return None;
    }

    let lead_ml = inputs.consumed_ml - expected;
    let lead_bottles = -bottles_behind(inputs.consumed_ml, expected, inputs.bottle_ml);
    let (title, body) = match praise_tier(lead_bottles) {
        PraiseTier::Neutral => (
            "Nice pacing".to_string(),
            "You're right on track today. Keep it up.".to_string(),
        ),
        PraiseTier::Quantified => (
            "Ahead of pace".to_string(),
            format!("You're {lead_ml} ml ahead of where you need to be."),
        ),
    };
    Some(ScheduledNudge {
        kind: NudgeKind::Praise,
        title,
        body,
        at: inputs.now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    // 08:00-22:00: 25% at 11:30, 70% at 17:48
    fn inputs(now: NaiveDateTime, consumed_ml: u32) -> NudgeInputs {
        NudgeInputs {
            now,
            window: WakeSleepWindow::new(480, 1320),
            today: DayKey::from_date(now.date()),
            goal_ml: 2000,
            bottle_ml: 500,
            consumed_ml,
        }
    }

    fn opened_today() -> NudgeTokens {
        NudgeTokens {
            last_opened: Some(at(8, 30)),
            ..Default::default()
        }
    }

    #[test]
    fn test_morning_reset_until_acknowledged() {
        let mut tokens = NudgeTokens::default();
        let now = inputs(at(8, 5), 0);
        assert!(morning_reset_due(&now, &tokens));

        tokens.morning_reset = Some(morning_reset_token(&now.today, 480));
        assert!(!morning_reset_due(&now, &tokens));
        assert_eq!(morning_reset_prompt(&now, &tokens), NudgeDecision::Withdraw);
    }

    #[test]
    fn test_early_nudge_scheduled_at_quarter_mark() {
        // Nothing drunk: expected at 11:30 is 600 ml = 1.2 bottles
        let NudgeDecision::Schedule(nudge) = early_nudge(&inputs(at(8, 10), 0), &NudgeTokens::default())
        else {
            panic!("expected an early nudge");
        };
        assert_eq!(nudge.kind, NudgeKind::Early);
        assert_eq!(nudge.at, at(11, 30));
    }

    #[test]
    fn test_early_nudge_leaves_a_minute_of_lead() {
        let NudgeDecision::Schedule(nudge) = early_nudge(&inputs(at(11, 40), 0), &NudgeTokens::default())
        else {
            panic!("expected an early nudge");
        };
        assert_eq!(nudge.at, at(11, 41));
    }

    #[test]
    fn test_early_nudge_waits_twenty_minutes_after_wake() {
        // 08:00-09:00 is clamped to a 6h pacing denominator, but the 25% mark is 08:15
        let mut short = inputs(at(8, 0), 0);
        short.window = WakeSleepWindow::new(480, 540);
        short.bottle_ml = 250;
        let NudgeDecision::Schedule(nudge) = early_nudge(&short, &NudgeTokens::default()) else {
            panic!("expected an early nudge");
        };
        assert_eq!(nudge.at, at(8, 20));
    }

    #[test]
    fn test_recent_log_pushes_early_nudge_back() {
        let tokens = NudgeTokens {
            last_log_at: Some(at(11, 45)),
            ..Default::default()
        };
        let NudgeDecision::Schedule(nudge) = early_nudge(&inputs(at(11, 46), 100), &tokens) else {
            panic!("expected an early nudge");
        };
        assert_eq!(nudge.at, at(12, 15));

        // A log from the previous day does not count
        let stale = NudgeTokens {
            last_log_at: Some(at(7, 0)),
            ..Default::default()
        };
        let NudgeDecision::Schedule(nudge) = early_nudge(&inputs(at(8, 10), 0), &stale) else {
            panic!("expected an early nudge");
        };
        assert_eq!(nudge.at, at(11, 30));
    }

    #[test]
    fn test_early_nudge_withdrawn_when_close_to_pace() {
        // 500 ml drunk: 100 ml behind at 11:30 is 0.2 bottles
        assert_eq!(
            early_nudge(&inputs(at(9, 0), 500), &NudgeTokens::default()),
            NudgeDecision::Withdraw
        );
    }

    #[test]
    fn test_early_nudge_fires_once_per_day() {
        let current = inputs(at(9, 0), 0);
        let tokens = NudgeTokens {
            early: Some(current.today.clone()),
            ..Default::default()
        };
        assert_eq!(early_nudge(&current, &tokens), NudgeDecision::Withdraw);
    }

    #[test]
    fn test_early_nudge_yields_to_late_after_seventy_percent() {
        assert_eq!(
            early_nudge(&inputs(at(18, 0), 0), &NudgeTokens::default()),
            NudgeDecision::Withdraw
        );
    }

    #[test]
    fn test_late_nudge_at_seventy_percent() {
        let NudgeDecision::Schedule(nudge) = late_nudge(&inputs(at(12, 0), 800), &NudgeTokens::default())
        else {
            panic!("expected a late nudge");
        };
        assert_eq!(nudge.at, at(17, 48));
    }

    #[test]
    fn test_late_nudge_skipped_after_reaction_to_early() {
        let current = inputs(at(13, 0), 400);
        let mut tokens = NudgeTokens {
            early: Some(current.today.clone()),
            early_fired_at: Some(at(11, 30)),
            ..Default::default()
        };
        assert!(matches!(late_nudge(&current, &tokens), NudgeDecision::Schedule(_)));

        tokens.last_log_at = Some(at(12, 0));
        assert_eq!(late_nudge(&current, &tokens), NudgeDecision::Withdraw);
    }

    #[test]
    fn test_late_nudge_withdrawn_after_sleep() {
        assert_eq!(
            late_nudge(&inputs(at(21, 59), 0), &NudgeTokens::default()),
            NudgeDecision::Withdraw
        );
    }

    #[test]
    fn test_praise_tiers() {
        assert_eq!(praise_tier(0.1), PraiseTier::Neutral);
        assert_eq!(praise_tier(0.25), PraiseTier::Neutral);
        assert_eq!(praise_tier(0.3), PraiseTier::Quantified);
    }

    #[test]
    fn test_praise_when_ahead() {
        // 12:30 expects 743 ml
        let nudge = praise(&inputs(at(12, 30), 1000), &opened_today()).unwrap();
        assert_eq!(nudge.kind, NudgeKind::Praise);
        assert_eq!(nudge.title, "Ahead of pace");
        assert!(nudge.body.contains("257 ml"));

        let neutral = praise(&inputs(at(12, 30), 800), &opened_today()).unwrap();
        assert_eq!(neutral.title, "Nice pacing");
    }

    #[test]
    fn test_praise_requirements() {
        // Behind pace
        assert!(praise(&inputs(at(12, 30), 700), &opened_today()).is_none());
        // Too early in the window
        assert!(praise(&inputs(at(10, 0), 2000), &opened_today()).is_none());
        // Not opened today
        assert!(praise(&inputs(at(12, 30), 1000), &NudgeTokens::default()).is_none());

        // Already nudged today
        let current = inputs(at(12, 30), 1000);
        let nudged = NudgeTokens {
            early: Some(current.today.clone()),
            ..opened_today()
        };
        assert!(praise(&current, &nudged).is_none());
    }
}
