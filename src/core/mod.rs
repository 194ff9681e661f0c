//! The daemon loop.
//!
//! `Core` owns the [`HydrationSession`] for the lifetime of `hydrated run`
//! and sleeps until the earliest of: the rollover deadline, the next pending
//! notification, the periodic nudge re-check, or a message from the signal
//! handler, config watcher or system monitors. Every wakeup runs
//! [`HydrationSession::tick`], so a rollover or a due notification is never
//! more than one wakeup away.
//!
//! With a simulated clock the loop fast-forwards: waits advance the clock
//! instead of blocking, and the loop stops at the simulation end.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::common::utils::{format_minutes, private_path};
use crate::config;
use crate::io::lock::DaemonLock;
use crate::io::signals::{SignalMessage, SignalState};
use crate::session::HydrationSession;
use crate::time_source::TimeSource;

/// Shortest wait between two ticks.
const MIN_WAIT: Duration = Duration::from_secs(1);

/// Everything needed to run the daemon loop.
pub(crate) struct CoreParams {
    pub session: HydrationSession,
    pub signal_state: SignalState,
    pub clock: Arc<dyn TimeSource>,
    /// Config file to re-read on reload; `None` reloads from the default location.
    pub config_path: Option<PathBuf>,
    /// Held for the daemon's lifetime
    pub lock: Option<DaemonLock>,
    /// Simulated runs stop here.
    pub end: Option<NaiveDateTime>,
}

pub(crate) struct Core {
    session: HydrationSession,
    signal_state: SignalState,
    clock: Arc<dyn TimeSource>,
    config_path: Option<PathBuf>,
    _lock: Option<DaemonLock>,
    end: Option<NaiveDateTime>,
    /// Set once the message channel is gone; the loop then runs on timers only.
    disconnected: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            session: params.session,
            signal_state: params.signal_state,
            clock: params.clock,
            config_path: params.config_path,
            _lock: params.lock,
            end: params.end,
            disconnected: false,
        }
    }

    /// Run until shutdown (or the simulation end), then persist.
    pub fn execute(mut self) -> Result<()> {
        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", private_path(&custom_dir));
        }

        let window = self.session.config().window();
        log_block_start!(
            "Tracking {} - {}, goal {} ml",
            format_minutes(window.wake()),
            format_minutes(window.sleep()),
            self.session.state().goal_ml
        );
        if !self.session.notifications_allowed() && self.session.config().nudges_enabled() {
            log_indented!("Notifications unavailable, nudges disabled");
        }

        self.session.check_day();
        self.main_loop()?;

        self.session.on_background();
        log_block_start!("State saved");
        log_end!();
        Ok(())
    }

    fn main_loop(&mut self) -> Result<()> {
        while self.signal_state.running.load(Ordering::SeqCst) {
            if let Some(end) = self.end
                && self.clock.now_naive() >= end
            {
                log_block_start!("Simulation finished");
                break;
            }

            self.session.tick();

            let now = self.clock.now_naive();
            let mut deadline = self.session.next_deadline();
            if let Some(end) = self.end {
                deadline = deadline.min(end);
            }
            let wait = (deadline - now).to_std().unwrap_or(MIN_WAIT).max(MIN_WAIT);

            match self.wait_for_message(wait) {
                Ok(message) => self.handle_message(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if !self.disconnected {
                        self.disconnected = true;
                        log_pipe!();
                        log_error!("Signal handler disconnected unexpectedly");
                        log_indented!("Continuing on timers only");
                    }
                    self.clock.sleep(wait);
                }
            }
        }
        Ok(())
    }

    /// Block until a message arrives or `wait` elapses.
    fn wait_for_message(&self, wait: Duration) -> Result<SignalMessage, RecvTimeoutError> {
        if !self.clock.is_simulated() {
            return self.signal_state.signal_receiver.recv_timeout(wait);
        }
        match self.signal_state.signal_receiver.try_recv() {
            Ok(message) => Ok(message),
            Err(TryRecvError::Empty) => {
                self.clock.sleep(wait);
                Err(RecvTimeoutError::Timeout)
            }
            Err(TryRecvError::Disconnected) => {
                self.clock.sleep(wait);
                Err(RecvTimeoutError::Timeout)
            }
        }
    }

    fn handle_message(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::Refresh => {
                self.session.reload();
                self.session.check_day();
                self.session.evaluate_nudges();
            }
            SignalMessage::Reload => self.reload_config(),
            SignalMessage::TimeChange | SignalMessage::Sleep { resuming: true } => {
                self.session.check_day();
                self.session.evaluate_nudges();
            }
            SignalMessage::Sleep { resuming: false } => {}
            SignalMessage::Shutdown => {
                self.signal_state.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn reload_config(&mut self) {
        let loaded = match &self.config_path {
            Some(path) => config::load_from_path(path),
            None => config::load(),
        };
        match loaded {
            Ok(new_config) => {
                if new_config == *self.session.config() {
                    log_debug!("Configuration unchanged");
                    return;
                }
                new_config.log_config();
                self.session.apply_config(new_config);
            }
            Err(e) => {
                log_pipe!();
                log_error!("Failed to reload config: {:#}", e);
                log_indented!("Continuing with previous configuration");
            }
        }
    }
}
