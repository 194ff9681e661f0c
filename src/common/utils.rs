//! Small shared helpers for paths, processes and minute-of-day parsing.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use std::path::Path;

/// Replace the home directory prefix with `~` so logs don't leak usernames.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Parse an `HH:MM` (or `HH:MM:SS`) string into minutes after midnight.
pub fn parse_minutes(value: &str) -> Result<i64> {
    let time = NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .with_context(|| format!("Invalid time '{value}', expected HH:MM"))?;
    Ok(i64::from(time.hour()) * 60 + i64::from(time.minute()))
}

/// Render minutes after midnight as `HH:MM`, wrapping past midnight.
pub fn format_minutes(minutes: i64) -> String {
    let m = minutes.rem_euclid(1440);
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Check whether a process with the given PID is alive.
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0 only performs the permission/existence check
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Ask a running daemon to re-read its snapshot (treated as a foreground event).
pub fn signal_refresh(pid: u32) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGUSR1).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes_accepts_both_formats() {
        assert_eq!(parse_minutes("07:30").unwrap(), 450);
        assert_eq!(parse_minutes("22:00:00").unwrap(), 1320);
        assert!(parse_minutes("25:00").is_err());
        assert!(parse_minutes("noon").is_err());
    }

    #[test]
    fn test_format_minutes_wraps() {
        assert_eq!(format_minutes(450), "07:30");
        assert_eq!(format_minutes(1440 + 60), "01:00");
        assert_eq!(format_minutes(-60), "23:00");
    }
}
