//! Level and volume changes: `track`, `level`, `extra`, `undo`, `refill`.

use crate::args::Command;
use crate::session::HydrationSession;
use crate::state::MutationOutcome;

pub fn handle_intake(session: &mut HydrationSession, command: &Command) {
    log_version!();
    let outcome = match command {
        Command::Track(percent) => session.track(*percent),
        Command::Level(percent) => session.adjust(*percent),
        Command::Extra(ml) => session.add_extra(*ml),
        Command::Undo => session.undo(),
        Command::Refill(percent) => session.refill(*percent),
        _ => return,
    };
    report_outcome(session, command, &outcome);
}

/// Summarize a mutation for the terminal.
pub(crate) fn report_outcome(
    session: &HydrationSession,
    command: &Command,
    outcome: &MutationOutcome,
) {
    if !outcome.changed {
        let reason = match command {
            Command::Undo => "Nothing to undo today",
            Command::Extra(_) => "Nothing added",
            Command::Switch(_) | Command::Goal(_) => "Today's state already matches",
            _ => "Level unchanged",
        };
        log_block_start!("{}", reason);
        return;
    }

    let state = session.state();
    log_block_start!(
        "{}: {} / {} ml ({}%)",
        command.name(),
        state.total_consumed(),
        state.goal_ml,
        state.percent_of_goal()
    );
    log_indented!(
        "Bottle {}% full ({} ml drunk from it)",
        (state.remaining * 100.0).round(),
        state.current_bottle_ml()
    );
    if let Some(attribution) = &outcome.attribution {
        let verb = if *command == Command::Undo { "Taken back from" } else { "Counted toward" };
        log_indented!("{} rhythm window {}", verb, attribution.segment + 1);
    }
}
