//! Help output for hydrated.

/// Show brief usage for a command (used for error messages)
pub fn show_command_usage(command: &str) {
    match command {
        "track" | "t" => log_block_start!("Usage: hydrated track <level>"),
        "level" | "l" => log_block_start!("Usage: hydrated level <level>"),
        "extra" | "e" => log_block_start!("Usage: hydrated extra <ml>"),
        "refill" | "r" => log_block_start!("Usage: hydrated refill [level]"),
        "switch" => log_block_start!("Usage: hydrated switch <bottle_ml>"),
        "goal" | "g" => log_block_start!("Usage: hydrated goal <ml>"),
        "estimate" => log_block_start!("Usage: hydrated estimate <image>"),
        "simulate" | "S" => {
            log_block_start!("Usage: hydrated simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\" [--log]")
        }
        "help" | "h" => log_block_start!("Usage: hydrated help [COMMAND]"),
        _ => log_block_start!("Usage: hydrated [OPTIONS] [COMMAND]"),
    }
}

/// `hydrated help [COMMAND]`
pub fn run_help_command(command: Option<&str>) {
    match command {
        None => display_general_help(),
        Some("track" | "t" | "level" | "l") => display_level_help(),
        Some("refill" | "r") => display_refill_help(),
        Some("estimate") => display_estimate_help(),
        Some("simulate" | "S") => display_simulate_help(),
        Some(known @ ("status" | "s" | "score" | "ack" | "undo" | "u" | "extra" | "e"
        | "switch" | "goal" | "g" | "run" | "help" | "h")) => {
            log_version!();
            show_command_usage(known);
            log_indented!("{}", summary_for(known));
            log_end!();
        }
        Some(unknown) => {
            log_version!();
            log_pipe!();
            log_warning!("Unknown command: {}", unknown);
            if let Some(suggestion) = super::suggest_command(unknown) {
                log_indented!("Did you mean '{}'?", suggestion);
            }
            log_end!();
        }
    }
}

fn summary_for(command: &str) -> &'static str {
    match command {
        "status" | "s" => "Show today's progress, pacing and rhythm",
        "score" => "Show today's rhythm score and the 7-day average",
        "ack" => "Dismiss the morning reset prompt",
        "undo" | "u" => "Revert the last change made today",
        "extra" | "e" => "Add water drunk from something other than the bottle",
        "switch" => "Use a bottle of a different size from now on",
        "goal" | "g" => "Change the daily goal",
        "run" => "Start the daemon (rollover, reminders, notifications)",
        "help" | "h" => "Show help for a command",
        _ => "",
    }
}

/// Full usage, for `--help`.
pub fn display_usage() {
    log_version!();
    log_block_start!("Usage: hydrated [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>   Use a custom configuration directory");
    log_indented!("-d, --debug          Show detailed operational messages");
    log_indented!("-h, --help           Print help information");
    log_indented!("-V, --version        Print version information");
    display_command_list();
    log_end!();
}

fn display_general_help() {
    log_version!();
    display_command_list();
    log_pipe!();
    log_info!("Use 'hydrated help <command>' to see detailed help for a specific command.");
    log_end!();
}

fn display_command_list() {
    log_block_start!("Commands:");
    log_indented!("run                     Start the daemon (default)");
    log_indented!("status, s               Today's progress and pacing");
    log_indented!("track, t <level>        Record drinking down to a level");
    log_indented!("level, l <level>        Correct the level without logging a sip");
    log_indented!("extra, e <ml>           Add water from another source");
    log_indented!("undo, u                 Revert the last change");
    log_indented!("refill, r [level]       Finish the bottle and start a full one");
    log_indented!("switch <ml>             Change bottle size");
    log_indented!("goal, g <ml>            Change the daily goal");
    log_indented!("estimate <image>        Read the level from a photo");
    log_indented!("score                   Rhythm score and 7-day average");
    log_indented!("ack                     Dismiss the morning reset prompt");
    log_indented!("simulate, S <from> <to> Dry-run reminders on a fast clock");
    log_indented!("help, h [COMMAND]       Show detailed help for a command");
}

fn display_level_help() {
    log_version!();
    log_block_start!("track / level - Set the bottle level");
    show_command_usage("track");
    show_command_usage("level");
    log_block_start!("Levels:");
    log_indented!("60, 60%   Percent of the bottle still full");
    log_indented!("0.6       The same as a fraction");
    log_pipe!();
    log_indented!("`track` counts the drop as a sip for your rhythm score.");
    log_indented!("`level` only corrects the reading.");
    log_indented!("Levels are rounded by the `snap` setting.");
    log_end!();
}

fn display_refill_help() {
    log_version!();
    log_block_start!("refill - Finish the current bottle");
    show_command_usage("refill");
    log_indented!("Counts the current bottle as drunk down to [level] (default: as it is now)");
    log_indented!("and starts a new full one. Anything still left over is not counted.");
    log_end!();
}

fn display_estimate_help() {
    log_version!();
    log_block_start!("estimate - Read the bottle level from a photo");
    show_command_usage("estimate");
    log_indented!("Sends the image to estimation_endpoint and tracks the returned level.");
    log_indented!("Press Ctrl-C to cancel; the level is left unchanged.");
    log_end!();
}

fn display_simulate_help() {
    log_version!();
    log_block_start!("simulate - Dry-run the daemon on a fast clock");
    show_command_usage("simulate");
    log_indented!("Starts from a copy of today's state and prints every rollover");
    log_indented!("and notification in order. Nothing is saved.");
    log_block_start!("Options:");
    log_indented!("-l, --log   Write the output to hydrated-simulation-<time>.log");
    log_end!();
}
