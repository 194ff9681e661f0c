//! Configuration system for hydrated.
//!
//! Settings live in `hydrated.toml` under `$XDG_CONFIG_HOME/hydrated/` (or the
//! directory passed with `--config`). A commented default file is written on
//! first load. Every field is optional; missing ones fall back to the values
//! in `common::constants`.
//!
//! ```toml
//! #[Schedule]
//! wake = "07:00"               # Start of the hydration window and of each tracking day
//! sleep = "23:00"              # End of the hydration window (<= wake means the next day)
//!
//! #[Goal]
//! goal_ml = 2000               # Daily goal in ml (250-10000)
//! bottle_ml = 500              # Volume of the tracked bottle in ml (100-5000)
//!
//! #[Behavior]
//! snap = "continuous"          # Level rounding: continuous, percent, tenths, quarters
//! nudges = true                # Schedule reminder and praise notifications
//!
//! #[Estimation]
//! estimation_endpoint = ""     # Fill estimation service URL (empty disables `estimate`)
//! estimation_timeout_secs = 30 # Request timeout in seconds (5-120)
//! ```
//!
//! Loading validates ranges and the time format and fails with a descriptive
//! error. The watcher sends a reload event to the daemon whenever the file
//! changes.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use serde::Deserialize;
use std::time::Duration;

use crate::common::constants::*;
use crate::common::utils::{format_minutes, parse_minutes};
use crate::pacing::WakeSleepWindow;
use crate::state::SnapMode;

pub use builder::{create_default_config, update_setting};
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Wake time (HH:MM). Also the day boundary.
    pub wake: Option<String>,
    pub sleep: Option<String>,
    pub goal_ml: Option<u32>,
    pub bottle_ml: Option<u32>,
    pub snap: Option<SnapMode>,
    pub nudges: Option<bool>,
    pub estimation_endpoint: Option<String>,
    pub estimation_timeout_secs: Option<u64>,
}

fn minutes_or_default(value: Option<&str>, default: &str) -> i64 {
    value
        .and_then(|v| parse_minutes(v).ok())
        .or_else(|| parse_minutes(default).ok())
        .unwrap_or(0)
}

impl Config {
    pub fn wake_minutes(&self) -> i64 {
        minutes_or_default(self.wake.as_deref(), DEFAULT_WAKE)
    }

    pub fn sleep_minutes(&self) -> i64 {
        minutes_or_default(self.sleep.as_deref(), DEFAULT_SLEEP)
    }

    pub fn window(&self) -> WakeSleepWindow {
        WakeSleepWindow::new(self.wake_minutes(), self.sleep_minutes())
    }

    pub fn goal(&self) -> u32 {
        self.goal_ml.unwrap_or(DEFAULT_GOAL_ML)
    }

    pub fn bottle(&self) -> u32 {
        self.bottle_ml.unwrap_or(DEFAULT_BOTTLE_ML)
    }

    pub fn snap_mode(&self) -> SnapMode {
        self.snap.unwrap_or_default()
    }

    pub fn nudges_enabled(&self) -> bool {
        self.nudges.unwrap_or(DEFAULT_NUDGES)
    }

    /// Configured estimation endpoint, `None` when unset or blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.estimation_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn estimation_timeout(&self) -> Duration {
        Duration::from_secs(
            self.estimation_timeout_secs
                .unwrap_or(DEFAULT_ESTIMATION_TIMEOUT_SECS),
        )
    }

    /// Whether a reload from `self` to `other` moves the day boundary or window.
    pub fn schedule_changed(&self, other: &Config) -> bool {
        self.window() != other.window()
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!(
            "Window: {} - {}",
            format_minutes(self.wake_minutes()),
            format_minutes(self.sleep_minutes())
        );
        log_indented!("Goal: {} ml, bottle {} ml", self.goal(), self.bottle());
        log_indented!("Snap: {}", self.snap_mode().as_str());
        log_indented!(
            "Nudges: {}",
            if self.nudges_enabled() { "enabled" } else { "disabled" }
        );
        if let Some(endpoint) = self.endpoint() {
            log_indented!(
                "Estimation: {} ({}s timeout)",
                endpoint,
                self.estimation_timeout().as_secs()
            );
        }
    }
}
