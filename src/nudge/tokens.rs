//! Per-day "already fired" bookkeeping for each nudge kind.

use chrono::NaiveDateTime;

use crate::common::constants::*;
use crate::day::{DayKey, day_key};
use crate::store::{self, KeyValueStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NudgeTokens {
    /// `<dayKey>@<wakeMinutes>` of the last acknowledged morning reset.
    pub morning_reset: Option<String>,
    pub early: Option<DayKey>,
    pub late: Option<DayKey>,
    pub praise: Option<DayKey>,
    /// When the early nudge was delivered.
    pub early_fired_at: Option<NaiveDateTime>,
    pub last_opened: Option<NaiveDateTime>,
    /// Most recent consumption log.
    pub last_log_at: Option<NaiveDateTime>,
}

pub fn morning_reset_token(day: &DayKey, wake_minutes: i64) -> String {
    format!("{day}@{wake_minutes}")
}

impl NudgeTokens {
    /// Read all tokens. Missing or unreadable keys load as unset.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let day = |key: &str| store::load_token(store, key).map(DayKey::from);
        Self {
            morning_reset: store::load_token(store, KEY_MORNING_RESET),
            early: day(KEY_EARLY_NUDGE),
            late: day(KEY_LATE_NUDGE),
            praise: day(KEY_PRAISE),
            early_fired_at: store::load_timestamp(store, KEY_EARLY_FIRED_AT),
            last_opened: store::load_timestamp(store, KEY_LAST_OPENED),
            last_log_at: store::load_timestamp(store, KEY_LAST_LOG_AT),
        }
    }

    /// Write every token. Stops at the first failing key.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> anyhow::Result<()> {
        let text = [
            (KEY_MORNING_RESET, self.morning_reset.clone()),
            (KEY_EARLY_NUDGE, self.early.as_ref().map(ToString::to_string)),
            (KEY_LATE_NUDGE, self.late.as_ref().map(ToString::to_string)),
            (KEY_PRAISE, self.praise.as_ref().map(ToString::to_string)),
        ];
        for (key, value) in text {
            match value {
                Some(value) => store.set(key, &value)?,
                None => store.remove(key)?,
            }
        }

        let stamps = [
            (KEY_EARLY_FIRED_AT, self.early_fired_at),
            (KEY_LAST_OPENED, self.last_opened),
            (KEY_LAST_LOG_AT, self.last_log_at),
        ];
        for (key, value) in stamps {
            match value {
                Some(at) => store::save_timestamp(store, key, at)?,
                None => store.remove(key)?,
            }
        }
        Ok(())
    }

    pub fn morning_reset_done(&self, today: &DayKey, wake_minutes: i64) -> bool {
        self.morning_reset.as_deref() == Some(morning_reset_token(today, wake_minutes).as_str())
    }

    pub fn early_fired_on(&self, today: &DayKey) -> bool {
        self.early.as_ref() == Some(today)
    }

    pub fn late_fired_on(&self, today: &DayKey) -> bool {
        self.late.as_ref() == Some(today)
    }

    pub fn praised_on(&self, today: &DayKey) -> bool {
        self.praise.as_ref() == Some(today)
    }

    /// Whether the app was opened during the day `today`.
    pub fn opened_on(&self, today: &DayKey, boundary_minutes: i64) -> bool {
        self.last_opened
            .is_some_and(|at| day_key(at, boundary_minutes) == *today)
    }

    /// True when something was logged after the early nudge went out.
    ///
    /// Vacuously false when the early nudge never fired.
    pub fn logged_since_early(&self) -> bool {
        match (self.early_fired_at, self.last_log_at) {
            (Some(fired), Some(logged)) => logged > fired,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_tokens_survive_store_round_trip() {
        let today = DayKey::from_date(at(0, 0).date());
        let tokens = NudgeTokens {
            morning_reset: Some(morning_reset_token(&today, 420)),
            early: Some(today.clone()),
            late: None,
            praise: Some(today.clone()),
            early_fired_at: Some(at(11, 0)),
            last_opened: Some(at(9, 30)),
            last_log_at: None,
        };

        let mut store = MemoryStore::new();
        tokens.save(&mut store).unwrap();
        assert_eq!(NudgeTokens::load(&store), tokens);
        assert_eq!(store.get(KEY_MORNING_RESET).unwrap().as_deref(), Some("2026-04-02@420"));
    }

    #[test]
    fn test_morning_reset_token_includes_wake_time() {
        let today = DayKey::from_date(at(0, 0).date());
        let tokens = NudgeTokens {
            morning_reset: Some(morning_reset_token(&today, 420)),
            ..Default::default()
        };
        assert!(tokens.morning_reset_done(&today, 420));
        // Changing the wake time re-arms the prompt
        assert!(!tokens.morning_reset_done(&today, 450));
    }

    #[test]
    fn test_logged_since_early() {
        let mut tokens = NudgeTokens {
            last_log_at: Some(at(10, 0)),
            ..Default::default()
        };
        assert!(!tokens.logged_since_early());

        tokens.early_fired_at = Some(at(11, 0));
        assert!(!tokens.logged_since_early());
        tokens.last_log_at = Some(at(11, 30));
        assert!(tokens.logged_since_early());
    }

    #[test]
    fn test_opened_on_uses_day_boundary() {
        let tokens = NudgeTokens {
            last_opened: Some(at(6, 0)),
            ..Default::default()
        };
        // 06:00 still belongs to the previous day with a 07:00 boundary
        let today = DayKey::from_date(at(0, 0).date());
        assert!(!tokens.opened_on(&today, 420));
        assert!(tokens.opened_on(&today, 0));
    }
}
