//! Unix signal handling for the daemon.
//!
//! Every source of outside events (signals, the config watcher, logind and
//! the clock-change monitor) feeds the same channel of [`SignalMessage`]s,
//! which the daemon loop drains between timer deadlines.
//!
//! - `SIGUSR1`: a CLI command changed the stored state, reload and re-check
//! - `SIGUSR2`: reload the configuration file
//! - `SIGTERM`, `SIGINT`, `SIGHUP`: persist and exit

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{Receiver, Sender, channel},
};
use std::thread;

/// Unified message type for everything that wakes the daemon loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    /// Stored state changed in another process (SIGUSR1)
    Refresh,
    /// Configuration reload (SIGUSR2 or file watcher)
    Reload,
    /// System clock jumped
    TimeChange,
    /// Suspend/resume reported by logind
    Sleep { resuming: bool },
    /// SIGTERM, SIGINT or SIGHUP
    Shutdown,
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// False once a shutdown signal arrived
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Handed to the config watcher and the D-Bus monitors
    pub signal_sender: Sender<SignalMessage>,
}

/// Map a raw signal number to the message it produces.
pub fn message_for(signal: i32) -> Option<SignalMessage> {
    match signal {
        SIGUSR1 => Some(SignalMessage::Refresh),
        SIGUSR2 => Some(SignalMessage::Reload),
        SIGTERM | SIGINT | SIGHUP => Some(SignalMessage::Shutdown),
        _ => None,
    }
}

/// Register signal handlers and spawn the thread forwarding them as messages.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let sender = signal_sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let Some(message) = message_for(sig) else {
                continue;
            };

            match message {
                SignalMessage::Refresh => log_debug!("Received refresh signal"),
                SignalMessage::Reload => {
                    log_pipe!();
                    log_info!("Received configuration reload signal");
                }
                SignalMessage::Shutdown => {
                    log_pipe!();
                    if sig == SIGINT {
                        log_info!("Received interrupt signal, shutting down...");
                    } else {
                        log_info!("Received termination request, shutting down...");
                    }
                    running_clone.store(false, Ordering::SeqCst);
                }
                _ => {}
            }

            let shutdown = message == SignalMessage::Shutdown;
            if sender.send(message).is_err() || shutdown {
                // Main loop gone, or nothing left to forward
                break;
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
