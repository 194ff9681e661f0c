//! Undo history: pre-mutation snapshots of the tracked fields.
//!
//! Each entry remembers the values a mutation overwrote plus any rhythm-window
//! credit it produced, so undo restores the state and the daily log exactly.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::common::constants::HISTORY_LIMIT;
use crate::day::DayKey;
use crate::state::Celebration;

/// What kind of user action produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Explicit "I drank down to here" commit.
    Track,
    /// Scroll/drag adjustment of the level.
    Adjust,
    /// Level set from the remote fill estimator.
    Estimate,
    /// Quick-add volume outside the bottle.
    Extra,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Track => "track",
            Action::Adjust => "adjust",
            Action::Estimate => "estimate",
            Action::Extra => "extra",
        }
    }
}

/// Credit an action added to one rhythm window of one day's log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmAttribution {
    pub day: DayKey,
    pub segment: usize,
    pub ml: u32,
    /// The log entry did not exist before this action and must vanish on undo.
    pub created_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub at: NaiveDateTime,
    pub remaining: f64,
    pub completed_bottles: u32,
    pub carry_ml: u32,
    pub extra_ml: u32,
    pub action: Action,
    #[serde(default)]
    pub attribution: Option<RhythmAttribution>,
    #[serde(default)]
    pub celebrate: Option<Celebration>,
}

/// Append an entry, evicting the oldest ones past the history limit.
pub fn push_bounded(history: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    history.push(entry);
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(i: u32) -> HistoryEntry {
        HistoryEntry {
            at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            remaining: 1.0,
            completed_bottles: i,
            carry_ml: 0,
            extra_ml: 0,
            action: Action::Adjust,
            attribution: None,
            celebrate: None,
        }
    }

    #[test]
    fn test_history_is_bounded_to_most_recent() {
        let mut history = Vec::new();
        for i in 0..(HISTORY_LIMIT as u32 + 7) {
            push_bounded(&mut history, entry(i));
        }
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.first().unwrap().completed_bottles, 7);
        assert_eq!(
            history.last().unwrap().completed_bottles,
            HISTORY_LIMIT as u32 + 6
        );
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&Action::Estimate).unwrap();
        assert_eq!(json, "\"estimate\"");
    }
}
