//! Binary entry point: parse arguments and dispatch.

use hydrated::args::{CliAction, ParsedArgs};
use hydrated::commands;
use hydrated::common::constants::EXIT_FAILURE;
use hydrated::config;
use hydrated::logger::Log;
use hydrated::{log_block_start, log_end, log_error_exit, log_indented, log_version};

fn set_up(debug_enabled: bool, config_dir: Option<String>) -> anyhow::Result<()> {
    Log::set_debug(debug_enabled);
    config::set_config_dir(config_dir)
}

fn exit_with_error(error: anyhow::Error) -> ! {
    log_error_exit!("{:#}", error);
    log_end!();
    std::process::exit(EXIT_FAILURE);
}

fn main() {
    let parsed = ParsedArgs::parse(std::env::args());

    let result = match parsed.action {
        CliAction::ShowVersion => {
            log_version!();
            log_end!();
            Ok(())
        }
        CliAction::ShowHelp => {
            commands::help::display_usage();
            Ok(())
        }
        CliAction::HelpCommand { command } => {
            commands::help::run_help_command(command.as_deref());
            Ok(())
        }
        CliAction::Invalid { message, usage_for } => {
            log_version!();
            log_error_exit!("{}", message);
            match usage_for {
                Some(command) => commands::help::show_command_usage(&command),
                None => {
                    let unknown = message.strip_prefix("Unknown command: ");
                    if let Some(suggestion) = unknown.and_then(commands::suggest_command) {
                        log_block_start!("Did you mean '{}'?", suggestion);
                    }
                    log_indented!("Run `hydrated --help` to see all commands");
                }
            }
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => set_up(debug_enabled, config_dir)
            .and_then(|()| commands::run::handle_run_command(debug_enabled)),
        CliAction::Simulate {
            debug_enabled,
            config_dir,
            start_time,
            end_time,
            log_to_file,
        } => set_up(debug_enabled, config_dir).and_then(|()| {
            commands::simulate::handle_simulate_command(&start_time, &end_time, log_to_file)
        }),
        CliAction::Command {
            debug_enabled,
            config_dir,
            command,
        } => set_up(debug_enabled, config_dir).and_then(|()| commands::run_command(&command)),
    };

    if let Err(error) = result {
        exit_with_error(error);
    }
}
