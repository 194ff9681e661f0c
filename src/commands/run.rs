//! `hydrated run` (and no arguments): start the daemon.

use anyhow::Result;
use std::sync::Arc;

use crate::common::utils::private_path;
use crate::config;
use crate::core::{Core, CoreParams};
use crate::io::dbus::start_system_monitors;
use crate::io::lock::{self, DaemonLock};
use crate::io::signals::setup_signal_handler;
use crate::nudge::DesktopNotifier;
use crate::session::HydrationSession;
use crate::store::FileStore;
use crate::time_source::{RealTimeSource, TimeSource};

pub fn handle_run_command(debug_enabled: bool) -> Result<()> {
    log_version!();
    if debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled");
    }

    let Some(daemon_lock) = DaemonLock::acquire()? else {
        match lock::running_daemon() {
            Some(info) => log_error_exit!("hydrated is already running (PID: {})", info.pid),
            None => log_error_exit!("hydrated is already running"),
        }
        log_end!();
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    };
    log_block_start!("Lock acquired, starting hydrated...");
    log_debug!("Lock file: {}", private_path(daemon_lock.path()));

    let config = config::load()?;
    config.log_config();
    let config_path = config::get_config_path()?;

    let signal_state = setup_signal_handler()?;
    if let Err(e) = config::start_config_watcher(signal_state.signal_sender.clone(), config_path) {
        log_pipe!();
        log_warning!("Hot reload unavailable: {:#}", e);
    }
    start_system_monitors(signal_state.signal_sender.clone());

    let store = FileStore::open_default();
    log_debug!("State directory: {}", private_path(store.dir()));

    let clock: Arc<dyn TimeSource> = Arc::new(RealTimeSource);
    let session = HydrationSession::new(
        config,
        Box::new(store),
        Box::new(DesktopNotifier::new()),
        clock.clone(),
    );

    Core::new(CoreParams {
        session,
        signal_state,
        clock,
        config_path: None,
        lock: Some(daemon_lock),
        end: None,
    })
    .execute()
}
