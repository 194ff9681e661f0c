//! System events that can make the current day stale.
//!
//! Two monitors run on their own threads and report into the daemon's
//! message channel:
//! - systemd-logind `PrepareForSleep` (zbus blocking API): a resume means the
//!   device may have slept through a day boundary
//! - a `timerfd` armed with `TFD_TIMER_CANCEL_ON_SET`: fires whenever the
//!   realtime clock is set (manual change, NTP step)
//!
//! Clock jumps reported right after a resume are folded into the resume.
//! Either monitor failing only disables that detection.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zbus::blocking::Connection;

use crate::io::signals::SignalMessage;

/// Seconds after a resume during which clock jumps are attributed to the resume.
const RESUME_GRACE_SECS: i64 = 5;
const MAX_MONITOR_RESTARTS: u8 = 3;
const RESTART_DELAY_MS: u64 = 2000;

#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true before suspend and false after resume.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// Sleep state shared by both monitors.
#[derive(Clone, Default)]
struct SleepTracker {
    is_sleeping: Arc<AtomicBool>,
    /// Unix seconds of the last resume, 0 if none
    resume_time: Arc<AtomicI64>,
}

impl SleepTracker {
    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn mark_sleeping(&self) {
        self.is_sleeping.store(true, Ordering::SeqCst);
    }

    fn mark_resumed(&self) {
        self.resume_time
            .store(Self::current_timestamp(), Ordering::SeqCst);
        self.is_sleeping.store(false, Ordering::SeqCst);
    }

    /// Whether a clock change event should be ignored.
    fn suppresses_time_change(&self) -> bool {
        if self.is_sleeping.load(Ordering::Relaxed) {
            return true;
        }
        let resumed = self.resume_time.load(Ordering::Relaxed);
        resumed != 0 && Self::current_timestamp() - resumed <= RESUME_GRACE_SECS
    }
}

/// Start the sleep/resume and clock-change monitors.
pub fn start_system_monitors(signal_sender: Sender<SignalMessage>) {
    let tracker = SleepTracker::default();

    thread::spawn({
        let sender = signal_sender.clone();
        let tracker = tracker.clone();
        move || run_sleep_monitor(sender, tracker)
    });

    thread::spawn(move || {
        if let Err(e) = monitor_time_changes(signal_sender, tracker) {
            log_pipe!();
            log_warning!("Time change monitor error: {}", e);
            log_indented!("Clock changes will be picked up by the next timer check");
        }
    });
}

/// Run the logind monitor, reconnecting a few times if the bus drops.
fn run_sleep_monitor(sender: Sender<SignalMessage>, tracker: SleepTracker) {
    for attempt in 0..=MAX_MONITOR_RESTARTS {
        match monitor_sleep_signals(&sender, &tracker) {
            Ok(()) => return,
            Err(e) => {
                log_pipe!();
                log_warning!("Sleep monitor error: {}", e);
                if attempt == MAX_MONITOR_RESTARTS {
                    log_indented!("Resume detection will not be available");
                    return;
                }
                log_indented!(
                    "Restarting sleep monitor (attempt {}/{})",
                    attempt + 1,
                    MAX_MONITOR_RESTARTS
                );
                thread::sleep(Duration::from_millis(RESTART_DELAY_MS));
            }
        }
    }
}

/// Returns `Ok(())` when the daemon's channel closed.
fn monitor_sleep_signals(sender: &Sender<SignalMessage>, tracker: &SleepTracker) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let logind_proxy =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let sleep_signals = logind_proxy
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;
    log_debug!("Subscribed to systemd-logind PrepareForSleep signals");

    for signal in sleep_signals {
        let going_to_sleep = match signal.args() {
            Ok(args) => args.start,
            Err(e) => {
                log_debug!("Unreadable PrepareForSleep signal: {}", e);
                continue;
            }
        };

        if going_to_sleep {
            tracker.mark_sleeping();
            log_debug!("System entering sleep");
            continue;
        }

        tracker.mark_resumed();
        log_pipe!();
        log_info!("System resumed from sleep, checking the day");
        if sender.send(SignalMessage::Sleep { resuming: true }).is_err() {
            return Ok(());
        }
    }

    anyhow::bail!("D-Bus connection lost, PrepareForSleep stream ended")
}

/// A realtime timer set far in the future; it only ever fires when the clock is set.
struct TimeChangeDetector {
    timer: TimerFd,
}

impl TimeChangeDetector {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let mut detector = Self { timer };
        detector.arm()?;
        Ok(detector)
    }

    fn arm(&mut self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);
        self.timer.set(Expiration::OneShot(far_future), flags)
    }

    fn wait_for_change(&mut self) -> Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::ECANCELED) => {
                self.arm().context("Failed to re-arm clock change timer")
            }
            Err(e) => Err(anyhow::anyhow!("Timer wait error: {}", e)),
        }
    }
}

fn monitor_time_changes(sender: Sender<SignalMessage>, tracker: SleepTracker) -> Result<()> {
    let mut detector =
        TimeChangeDetector::new().context("Failed to create time change detector")?;
    log_debug!("Watching for system clock changes");

    loop {
        detector.wait_for_change()?;
        if tracker.suppresses_time_change() {
            continue;
        }

        log_pipe!();
        log_info!("System time changed, checking the day");
        if sender.send(SignalMessage::TimeChange).is_err() {
            return Ok(());
        }
    }
}
