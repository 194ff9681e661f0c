//! Structured logging system with visual formatting.
//!
//! This module provides the box-drawing log output used by the daemon and the
//! one-shot commands. It includes semantic log levels and block-structured
//! helpers so a day of rollovers, nudges and mutations reads as a timeline.
//!
//! The logger supports runtime enable/disable so tests and scripted commands
//! can run quietly.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, OnceLock};

use crate::time_source::TimeSource;

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// Clock used for line timestamps while running against simulated time
static SIMULATED_CLOCK: OnceLock<Arc<dyn TimeSource>> = OnceLock::new();

// Channel for routing output to file when --log is active
static LOG_CHANNEL: OnceLock<Option<Sender<LogMessage>>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Main logging interface providing structured output formatting.
///
/// ## Logging Conventions
///
/// - **`log_block_start!`**: begins a distinct block (day rollover, config reload,
///   nudge scheduling). Prints an empty pipe for spacing, then `┣ message`.
/// - **`log_decorated!`**: a line that continues the current block.
/// - **`log_indented!`**: nested details (`┃   message`), e.g. the numbers of a snapshot.
/// - **`log_pipe!`**: a bare `┃` used before a standalone `log_warning!`/`log_error!`.
/// - **`log_version!`** / **`log_end!`**: header and terminator, once per run.
/// - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!`**:
///   `[LEVEL]`-prefixed semantic lines.
pub struct Log;

impl Log {
    /// Enable or disable logging.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Show `log_debug!` lines (set by `--debug`).
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Stamp every line with the given clock's time. Only used for simulated runs.
    pub fn set_simulated_clock(clock: Arc<dyn TimeSource>) {
        let _ = SIMULATED_CLOCK.set(clock);
    }

    /// Start file logging to the specified path.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(Some(tx.clone()))
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix for simulated runs, empty otherwise. Public for macro access.
    pub fn get_timestamp_prefix() -> String {
        match SIMULATED_CLOCK.get() {
            Some(clock) if clock.is_simulated() => {
                format!("[{}] ", clock.now().format("%H:%M:%S"))
            }
            _ => String::new(),
        }
    }
}

/// Guard for file logging that ensures clean shutdown.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// Strip ANSI color sequences (ESC [ ... m) for file output
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for ch in chars.by_ref() {
                    if ch == 'm' {
                        break;
                    }
                }
            } else {
                result.push(ch);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

// Routes output to the file logger when active, stdout otherwise (needed by macros)
pub fn write_output(text: &str) {
    if let Some(Some(tx)) = LOG_CHANNEL.get() {
        let clean_text = strip_ansi_codes(text);
        let _ = tx.send(LogMessage::Formatted(clean_text));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

// # Logging Macros

/// Shared emitter behind every logging macro: checks the enable flag, applies the
/// timestamp prefix and hands the laid-out line to `write_output`.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($layout:expr, $($arg:tt)+) => {{
        if $crate::logger::Log::is_enabled() {
            let prefix = $crate::logger::Log::get_timestamp_prefix();
            let message = format!($($arg)+);
            let layout = $layout;
            $crate::logger::write_output(&layout(prefix.as_str(), message.as_str()));
        }
    }};
}

/// Log a decorated message, typically as part of an existing block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p: &str, m: &str| format!("{p}┣ {m}\n"), $($arg)+)
    };
}

/// Log an indented message for sub-items or details within a block.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p: &str, m: &str| format!("{p}┃   {m}\n"), $($arg)+)
    };
}

/// Log a block start message, initiating a new conceptual block of information.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::__log_emit!(|p: &str, m: &str| format!("{p}┃\n{p}┣ {m}\n"), $($arg)+)
    };
}

/// Log a visual pipe separator for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::__log_emit!(|p: &str, _m: &str| format!("{p}┃\n"), "")
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_emit!(
            |p: &str, m: &str| format!("{p}┏ hydrated v{m} ━━╸\n"),
            "{}",
            env!("CARGO_PKG_VERSION")
        )
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::__log_emit!(|p: &str, _m: &str| format!("{p}╹\n"), "")
    };
}

/// Log a warning message with pipe prefix and yellow-colored text.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::__log_emit!(
            |p: &str, m: &str| format!("{p}┣[\x1b[33mWARNING\x1b[0m] {m}\n"),
            $($arg)+
        )
    };
}

/// Log an error message with pipe prefix and red-colored text.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::__log_emit!(
            |p: &str, m: &str| format!("{p}┣[\x1b[31mERROR\x1b[0m] {m}\n"),
            $($arg)+
        )
    };
}

/// Log an error that ends the current flow, closing the pipe with a corner.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::__log_emit!(
            |p: &str, m: &str| format!("{p}┃\n{p}┗[\x1b[31mERROR\x1b[0m] {m}\n"),
            $($arg)+
        )
    };
}

/// Log an informational message with pipe prefix and green-colored text.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::__log_emit!(
            |p: &str, m: &str| format!("{p}┣[\x1b[32mINFO\x1b[0m] {m}\n"),
            $($arg)+
        )
    };
}

/// Log a debug/operational message with pipe prefix. Only shown with `--debug`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        if $crate::logger::Log::is_debug() {
            $crate::__log_emit!(
                |p: &str, m: &str| format!("{p}┣[\x1b[32mDEBUG\x1b[0m] {m}\n"),
                $($arg)+
            )
        }
    };
}

/// Log a critical message with pipe prefix and red-colored text.
#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => {
        $crate::__log_emit!(
            |p: &str, m: &str| format!("{p}┣[\x1b[31mCRITICAL\x1b[0m] {m}\n"),
            $($arg)+
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes_removes_color() {
        let colored = "┣[\x1b[33mWARNING\x1b[0m] bottle switched";
        assert_eq!(strip_ansi_codes(colored), "┣[WARNING] bottle switched");
    }

    #[test]
    fn test_strip_ansi_codes_keeps_plain_text() {
        assert_eq!(strip_ansi_codes("┃   500 ml"), "┃   500 ml");
    }
}
