//! Time source abstraction for supporting both real-time and simulated time.
//!
//! The session never reads the wall clock directly; it asks the `TimeSource` it
//! was constructed with. Real runs use `RealTimeSource`. Tests and the
//! `--simulate` flag use `SimulatedTimeSource`, a fast-forward clock whose
//! `sleep` advances simulated time instantly, so a full day of rollovers and
//! nudges can be exercised in milliseconds.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

/// Trait for abstracting time operations
pub trait TimeSource: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Local>;

    /// Sleep for the specified duration (or simulate it)
    fn sleep(&self, duration: StdDuration);

    /// Check if this is a simulated time source
    fn is_simulated(&self) -> bool;

    /// Current wall-clock time without zone information, as the engine uses it.
    fn now_naive(&self) -> NaiveDateTime {
        self.now().naive_local()
    }
}

/// Real-time implementation that uses actual system time
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Fast-forward clock: time only moves when `sleep`, `advance` or `set` is called.
pub struct SimulatedTimeSource {
    current: Mutex<DateTime<Local>>,
}

impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start_time),
        }
    }

    /// Start the clock at a local wall-clock time.
    ///
    /// Falls back to the earliest valid instant when the wall-clock time is
    /// ambiguous (DST fold) and to the current time when it does not exist.
    pub fn at(naive: NaiveDateTime) -> Self {
        let start = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(Local::now);
        Self::new(start)
    }

    /// Move simulated time forward.
    pub fn advance(&self, by: ChronoDuration) {
        if let Ok(mut guard) = self.current.lock() {
            *guard += by;
        }
    }

    /// Jump to an absolute local wall-clock time (may go backwards, like a clock change).
    pub fn set(&self, naive: NaiveDateTime) {
        if let Some(target) = Local.from_local_datetime(&naive).earliest()
            && let Ok(mut guard) = self.current.lock()
        {
            *guard = target;
        }
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Local> {
        match self.current.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn sleep(&self, duration: StdDuration) {
        let step = ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero());
        self.advance(step);
        // Let other threads (signal, watcher) make progress
        std::thread::sleep(StdDuration::from_millis(1));
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM:SS"
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))
}
