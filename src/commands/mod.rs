//! Command-line command handlers for hydrated.
//!
//! One-shot commands share one flow: load the config, open a session on the
//! persisted state, mark the visit, run the operation, persist, and tell a
//! running daemon to re-read the store. While a daemon runs, the command's
//! session never touches notifications; the daemon owns them.

pub mod ack;
pub mod bottle;
pub mod estimate;
pub mod help;
pub mod intake;
pub mod run;
pub mod simulate;
pub mod status;

use anyhow::Result;
use std::sync::Arc;

use crate::args::{COMMAND_NAMES, Command};
use crate::config::{self, Config};
use crate::io::lock;
use crate::nudge::{DesktopNotifier, DetachedNotifier, NotificationService};
use crate::session::HydrationSession;
use crate::store::FileStore;
use crate::time_source::RealTimeSource;

/// Open a session on the default store against the real clock.
pub(crate) fn open_session(config: Config) -> HydrationSession {
    let notifier: Box<dyn NotificationService> = if lock::running_daemon().is_some() {
        Box::new(DetachedNotifier)
    } else {
        Box::new(DesktopNotifier::new())
    };
    HydrationSession::new(
        config,
        Box::new(FileStore::open_default()),
        notifier,
        Arc::new(RealTimeSource),
    )
}

/// Run one subcommand end to end.
pub fn run_command(command: &Command) -> Result<()> {
    let config = config::load()?;
    let mut session = open_session(config);
    session.on_foreground();

    match command {
        Command::Status => status::handle_status(&session),
        Command::Score => status::handle_score(&session),
        Command::Ack => ack::handle_ack(&mut session),
        Command::Track(_)
        | Command::Level(_)
        | Command::Extra(_)
        | Command::Undo
        | Command::Refill(_) => intake::handle_intake(&mut session, command),
        Command::Switch(bottle_ml) => bottle::handle_switch(&mut session, *bottle_ml)?,
        Command::Goal(goal_ml) => bottle::handle_goal(&mut session, *goal_ml)?,
        Command::Estimate(path) => estimate::handle_estimate(&mut session, path)?,
    }

    // Without a daemon nothing else would show what this visit scheduled
    session.deliver_due();
    session.on_background();

    if command.mutates() && lock::notify_daemon() {
        log_debug!("Signalled the running daemon to refresh");
    }
    log_end!();
    Ok(())
}

/// Levenshtein distance between two strings.
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];
    (0..=len1).for_each(|i| matrix[i][0] = i);
    (0..=len2).for_each(|j| matrix[0][j] = j);

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = usize::from(s1_chars[i - 1] != s2_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

/// The closest known command to a mistyped one, if any is close enough.
pub fn suggest_command(unknown: &str) -> Option<&'static str> {
    let target = unknown.to_lowercase();
    COMMAND_NAMES
        .iter()
        .map(|name| (*name, levenshtein_distance(&target, name)))
        .filter(|(_, distance)| *distance <= 2)
        .min_by_key(|(_, distance)| *distance)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", "ack"), 3);
        assert_eq!(levenshtein_distance("track", "track"), 0);
        assert_eq!(levenshtein_distance("trakc", "track"), 2);
        assert_eq!(levenshtein_distance("goal", "gaol"), 2);
    }

    #[test]
    fn test_suggests_close_commands_only() {
        assert_eq!(suggest_command("stauts"), Some("status"));
        assert_eq!(suggest_command("EXTRA"), Some("extra"));
        assert_eq!(suggest_command("refil"), Some("refill"));
        assert_eq!(suggest_command("photograph"), None);
    }
}
