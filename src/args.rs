//! Command-line argument parsing.
//!
//! Hand-rolled on purpose: the surface is a handful of global flags
//! (`--config`, `--debug`, `--help`, `--version`) plus one subcommand with at
//! most two positional arguments. Parsing never exits or logs; it returns a
//! [`CliAction`] and `main` decides what to print.

use std::path::PathBuf;

/// A one-shot operation on today's state.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    /// Record drinking down to this level (percent of the bottle).
    Track(f64),
    /// Move the level without counting it as a tracked sip.
    Level(f64),
    Extra(u32),
    Undo,
    /// Commit the given (or current) level and start a full bottle.
    Refill(Option<f64>),
    Switch(u32),
    Goal(u32),
    Estimate(PathBuf),
    Score,
    Ack,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Track(_) => "track",
            Command::Level(_) => "level",
            Command::Extra(_) => "extra",
            Command::Undo => "undo",
            Command::Refill(_) => "refill",
            Command::Switch(_) => "switch",
            Command::Goal(_) => "goal",
            Command::Estimate(_) => "estimate",
            Command::Score => "score",
            Command::Ack => "ack",
        }
    }

    /// Whether the command changes stored state.
    pub fn mutates(&self) -> bool {
        !matches!(self, Command::Status | Command::Score)
    }
}

/// Every command name the parser accepts, used for suggestions.
pub const COMMAND_NAMES: &[&str] = &[
    "run", "simulate", "status", "track", "level", "extra", "undo", "refill", "switch", "goal",
    "estimate", "score", "ack", "help",
];

/// What the binary should do.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Start the daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Run the daemon against a fast-forward clock between two instants
    Simulate {
        debug_enabled: bool,
        config_dir: Option<String>,
        start_time: String,
        end_time: String,
        log_to_file: bool,
    },
    Command {
        debug_enabled: bool,
        config_dir: Option<String>,
        command: Command,
    },
    /// `hydrated help [COMMAND]`
    HelpCommand { command: Option<String> },
    ShowHelp,
    ShowVersion,
    /// Bad input; `usage_for` names the command whose usage should be shown
    Invalid {
        message: String,
        usage_for: Option<String>,
    },
}

pub struct ParsedArgs {
    pub action: CliAction,
}

fn invalid(message: impl Into<String>, usage_for: Option<&str>) -> ParsedArgs {
    ParsedArgs {
        action: CliAction::Invalid {
            message: message.into(),
            usage_for: usage_for.map(str::to_string),
        },
    }
}

/// Parse a fill level given as `60`, `60%` or `0.6`.
///
/// Decimals up to 1 without a `%` are read as a fraction.
pub fn parse_percent(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    let (number, explicit_percent) = match trimmed.strip_suffix('%') {
        Some(number) => (number, true),
        None => (trimmed, false),
    };
    let parsed: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(format!("'{value}' is not a valid level"));
    }
    let percent = if !explicit_percent && parsed <= 1.0 && number.contains('.') {
        parsed * 100.0
    } else {
        parsed
    };
    if percent > 100.0 {
        return Err(format!("'{value}' is above 100%"));
    }
    Ok(percent)
}

fn parse_ml(value: &str) -> Result<u32, String> {
    let number = value.trim().trim_end_matches("ml").trim();
    number
        .parse::<u32>()
        .map_err(|_| format!("'{value}' is not a volume in ml"))
}

impl ParsedArgs {
    /// Parse `args` (including the program name at index 0).
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut config_dir: Option<String> = None;
        let mut log_to_file = false;
        let mut positionals: Vec<String> = Vec::new();

        let mut iter = args.into_iter().skip(1).map(|s| s.as_ref().to_string());
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => {
                    return ParsedArgs {
                        action: CliAction::ShowHelp,
                    };
                }
                "--version" | "-V" | "-v" => {
                    return ParsedArgs {
                        action: CliAction::ShowVersion,
                    };
                }
                "--debug" | "-d" => debug_enabled = true,
                "--log" | "-l" => log_to_file = true,
                "--config" | "-c" => match iter.next() {
                    Some(dir) => config_dir = Some(dir),
                    None => return invalid("--config requires a directory", None),
                },
                flag if flag.starts_with('-') && flag.parse::<f64>().is_err() => {
                    return invalid(format!("Unknown option: {flag}"), None);
                }
                _ => positionals.push(arg),
            }
        }

        let Some((name, rest)) = positionals.split_first() else {
            return ParsedArgs {
                action: CliAction::Run {
                    debug_enabled,
                    config_dir,
                },
            };
        };
        let name = name.as_str();

        let expect_args = |count: usize| -> Option<ParsedArgs> {
            if rest.len() > count {
                Some(invalid(
                    format!("Unexpected argument: {}", rest[count]),
                    Some(name),
                ))
            } else {
                None
            }
        };

        let command = match name {
            "run" => {
                if let Some(error) = expect_args(0) {
                    return error;
                }
                return ParsedArgs {
                    action: CliAction::Run {
                        debug_enabled,
                        config_dir,
                    },
                };
            }
            "simulate" | "S" => {
                if let Some(error) = expect_args(2) {
                    return error;
                }
                let [start_time, end_time] = match rest {
                    [start, end] => [start.clone(), end.clone()],
                    _ => return invalid("simulate requires a start and an end time", Some(name)),
                };
                return ParsedArgs {
                    action: CliAction::Simulate {
                        debug_enabled,
                        config_dir,
                        start_time,
                        end_time,
                        log_to_file,
                    },
                };
            }
            "help" | "h" => {
                if let Some(error) = expect_args(1) {
                    return error;
                }
                return ParsedArgs {
                    action: CliAction::HelpCommand {
                        command: rest.first().cloned(),
                    },
                };
            }
            "status" | "s" => Command::Status,
            "undo" | "u" => Command::Undo,
            "score" => Command::Score,
            "ack" => Command::Ack,
            "track" | "t" | "level" | "l" => {
                let Some(value) = rest.first() else {
                    return invalid(format!("{name} requires a level"), Some(name));
                };
                match parse_percent(value) {
                    Ok(percent) if matches!(name, "track" | "t") => Command::Track(percent),
                    Ok(percent) => Command::Level(percent),
                    Err(e) => return invalid(e, Some(name)),
                }
            }
            "refill" | "r" => match rest.first().map(|value| parse_percent(value)) {
                None => Command::Refill(None),
                Some(Ok(percent)) => Command::Refill(Some(percent)),
                Some(Err(e)) => return invalid(e, Some(name)),
            },
            "extra" | "e" | "switch" | "goal" | "g" => {
                let Some(value) = rest.first() else {
                    return invalid(format!("{name} requires a volume in ml"), Some(name));
                };
                match (name, parse_ml(value)) {
                    (_, Err(e)) => return invalid(e, Some(name)),
                    ("extra" | "e", Ok(ml)) => Command::Extra(ml),
                    ("switch", Ok(ml)) => Command::Switch(ml),
                    (_, Ok(ml)) => Command::Goal(ml),
                }
            }
            "estimate" => {
                let Some(path) = rest.first() else {
                    return invalid("estimate requires an image path", Some(name));
                };
                Command::Estimate(PathBuf::from(path))
            }
            unknown => {
                return invalid(format!("Unknown command: {unknown}"), None);
            }
        };

        let max_args = match command {
            Command::Status | Command::Undo | Command::Score | Command::Ack => 0,
            _ => 1,
        };
        if let Some(error) = expect_args(max_args) {
            return error;
        }

        ParsedArgs {
            action: CliAction::Command {
                debug_enabled,
                config_dir,
                command,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        let mut full = vec!["hydrated"];
        full.extend_from_slice(args);
        ParsedArgs::parse(full).action
    }

    fn command(args: &[&str]) -> Command {
        match parse(args) {
            CliAction::Command { command, .. } => command,
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[test]
    fn test_no_arguments_runs_the_daemon() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None
            }
        );
        assert_eq!(
            parse(&["-d", "run", "--config", "/tmp/h"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/h".to_string())
            }
        );
    }

    #[test]
    fn test_help_and_version_take_precedence() {
        assert_eq!(parse(&["track", "50", "--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        assert_eq!(
            parse(&["help", "track"]),
            CliAction::HelpCommand {
                command: Some("track".to_string())
            }
        );
    }

    #[test]
    fn test_level_commands() {
        assert_eq!(command(&["track", "60"]), Command::Track(60.0));
        assert_eq!(command(&["t", "35%"]), Command::Track(35.0));
        assert_eq!(command(&["level", "0.25"]), Command::Level(25.0));
        assert_eq!(command(&["refill"]), Command::Refill(None));
        assert_eq!(command(&["refill", "10"]), Command::Refill(Some(10.0)));
        assert!(matches!(parse(&["track", "140"]), CliAction::Invalid { .. }));
        assert!(matches!(parse(&["track"]), CliAction::Invalid { .. }));
    }

    #[test]
    fn test_volume_commands() {
        assert_eq!(command(&["extra", "250"]), Command::Extra(250));
        assert_eq!(command(&["e", "330ml"]), Command::Extra(330));
        assert_eq!(command(&["switch", "750"]), Command::Switch(750));
        assert_eq!(command(&["goal", "2500"]), Command::Goal(2500));
        assert!(matches!(
            parse(&["extra", "lots"]),
            CliAction::Invalid {
                usage_for: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_simulate_needs_both_times() {
        assert_eq!(
            parse(&["simulate", "2026-01-01 07:00:00", "2026-01-02 07:00:00", "--log"]),
            CliAction::Simulate {
                debug_enabled: false,
                config_dir: None,
                start_time: "2026-01-01 07:00:00".to_string(),
                end_time: "2026-01-02 07:00:00".to_string(),
                log_to_file: true,
            }
        );
        assert!(matches!(
            parse(&["simulate", "2026-01-01 07:00:00"]),
            CliAction::Invalid { .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_input() {
        assert!(matches!(parse(&["drink"]), CliAction::Invalid { usage_for: None, .. }));
        assert!(matches!(parse(&["--bogus"]), CliAction::Invalid { .. }));
        assert!(matches!(parse(&["undo", "twice"]), CliAction::Invalid { .. }));
        assert!(matches!(parse(&["--config"]), CliAction::Invalid { .. }));
    }

    #[test]
    fn test_mutating_commands() {
        assert!(!Command::Status.mutates());
        assert!(!Command::Score.mutates());
        assert!(Command::Ack.mutates());
        assert!(Command::Extra(1).mutates());
    }
}
