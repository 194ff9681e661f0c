//! Application-wide constants and default values.
//!
//! Every tunable number the hydration engine relies on lives here so the
//! pacing, rollover, rhythm and nudge modules agree on the same values.

// # Application Metadata

pub const APP_NAME: &str = "hydrated";
pub const CONFIG_FILE_NAME: &str = "hydrated.toml";

// # Exit Codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

// # Clock

pub const MINUTES_PER_DAY: i64 = 1440;

/// Extra time added to the rollover timer so it fires after the boundary, not on it.
pub const ROLLOVER_SAFETY_MARGIN_SECS: u64 = 2;

// # Consumption Bounds

/// Fractions at or below this value count as an empty bottle.
pub const EMPTY_EPSILON: f64 = 0.0001;

/// Upper bound for both carried-over and quick-add volume.
pub const MAX_SIDE_VOLUME_ML: u32 = 100_000;

/// Maximum number of undo entries kept per day.
pub const HISTORY_LIMIT: usize = 50;

#[cfg(not(feature = "extended-history"))]
pub const DAILY_LOG_RETENTION_DAYS: usize = 14;
#[cfg(feature = "extended-history")]
pub const DAILY_LOG_RETENTION_DAYS: usize = 365;

// # Configuration Defaults

pub const DEFAULT_WAKE: &str = "07:00";
pub const DEFAULT_SLEEP: &str = "23:00";
pub const DEFAULT_GOAL_ML: u32 = 2000;
pub const DEFAULT_BOTTLE_ML: u32 = 500;
pub const DEFAULT_NUDGES: bool = true;
pub const DEFAULT_ESTIMATION_TIMEOUT_SECS: u64 = 30;

// # Configuration Limits

pub const MINIMUM_GOAL_ML: u32 = 250;
pub const MAXIMUM_GOAL_ML: u32 = 10_000;
pub const MINIMUM_BOTTLE_ML: u32 = 100;
pub const MAXIMUM_BOTTLE_ML: u32 = 5_000;
pub const MINIMUM_ESTIMATION_TIMEOUT_SECS: u64 = 5;
pub const MAXIMUM_ESTIMATION_TIMEOUT_SECS: u64 = 120;

// # Pacing

/// Window duration bounds (minutes) when used as the pacing denominator.
pub const MIN_PACING_WINDOW_MINUTES: f64 = 360.0;
pub const MAX_PACING_WINDOW_MINUTES: f64 = 1200.0;

/// Checkpoint curve: (fraction of window elapsed, fraction of goal expected).
pub const PACING_CHECKPOINTS: [(f64, f64); 5] = [
    (0.25, 0.30),
    (0.50, 0.55),
    (0.70, 0.75),
    (0.87, 0.90),
    (1.00, 1.00),
];

pub const PACING_TOLERANCE_FRACTION: f64 = 0.05;
pub const PACING_TOLERANCE_MIN_ML: f64 = 150.0;

/// Lowest position the target line may take inside the bottle.
pub const TARGET_LINE_FLOOR: f64 = 0.03;

// # Rhythm

pub const RHYTHM_SEGMENTS: usize = 5;
pub const MEANINGFUL_INTAKE_ML: u32 = 120;
pub const RHYTHM_SEGMENT_WEIGHTS: [u32; RHYTHM_SEGMENTS] = [18, 16, 14, 12, 10];
/// (fraction of goal reached, volume points awarded), checked from the top.
pub const RHYTHM_VOLUME_TIERS: [(f64, u32); 3] = [(0.80, 30), (0.60, 20), (0.40, 10)];
pub const ROLLING_SCORE_DAYS: i64 = 7;

// # Nudges

pub const EARLY_NUDGE_BEHIND_BOTTLES: f64 = 0.3;
pub const LATE_NUDGE_BEHIND_BOTTLES: f64 = 0.5;
pub const EARLY_NUDGE_MIN_AFTER_WAKE_MINUTES: i64 = 20;
/// How long a consumption log holds back the early nudge.
pub const EARLY_NUDGE_LOG_GRACE_MINUTES: i64 = 30;
pub const EARLY_NUDGE_WINDOW_FRACTION: f64 = 0.25;
pub const LATE_NUDGE_WINDOW_FRACTION: f64 = 0.70;
pub const NUDGE_MIN_LEAD_MINUTES: i64 = 1;
pub const PRAISE_MIN_WINDOW_FRACTION: f64 = 0.25;
pub const PRAISE_NEUTRAL_MAX_LEAD_BOTTLES: f64 = 0.2;
pub const PRAISE_QUANTIFIED_MIN_LEAD_BOTTLES: f64 = 0.3;

/// How often the daemon re-evaluates nudges without any other trigger.
pub const NUDGE_RECHECK_INTERVAL_SECS: u64 = 300;

pub const NOTIFY_ID_MORNING_RESET: &str = "morning-reset";
pub const NOTIFY_ID_EARLY_NUDGE: &str = "nudge-early";
pub const NOTIFY_ID_LATE_NUDGE: &str = "nudge-late";
pub const NOTIFY_ID_PRAISE: &str = "praise";

// # Estimation Retry Policy

pub const ESTIMATE_MAX_ATTEMPTS: u32 = 2;
pub const ESTIMATE_BASE_DELAY_MS: u64 = 1200;
pub const ESTIMATE_BACKOFF_FACTOR: u32 = 2;
pub const ESTIMATE_MAX_DELAY_MS: u64 = 20_000;
pub const ESTIMATE_JITTER_MS: u64 = 450;
/// Granularity of cancellable waits.
pub const CANCEL_POLL_MS: u64 = 50;

// # Persistence Keys

pub const KEY_STATE: &str = "hydration.state";
pub const KEY_MORNING_RESET: &str = "nudge.morningReset";
pub const KEY_EARLY_NUDGE: &str = "nudge.early";
pub const KEY_LATE_NUDGE: &str = "nudge.late";
pub const KEY_PRAISE: &str = "nudge.praise";
pub const KEY_EARLY_FIRED_AT: &str = "nudge.earlyFiredAt";
pub const KEY_LAST_OPENED: &str = "app.lastOpened";
pub const KEY_LAST_LOG_AT: &str = "progress.lastLogAt";

// # Watcher

pub const CONFIG_DEBOUNCE_MS: u64 = 500;
