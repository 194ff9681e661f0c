//! `simulate <start> <end>`: run the daemon loop on a fast-forward clock.
//!
//! The run starts from a copy of the stored state and never writes back to
//! it. Notifications are printed instead of shown, so the output is a
//! timeline of when rollovers and reminders would happen with no further
//! logging.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;

use crate::config;
use crate::core::{Core, CoreParams};
use crate::io::signals::setup_signal_handler;
use crate::logger::Log;
use crate::nudge::NotificationService;
use crate::session::HydrationSession;
use crate::store::{FileStore, MemoryStore};
use crate::time_source::{self, SimulatedTimeSource, TimeSource};

/// Prints each notification when it comes due.
#[derive(Default)]
struct PrintingNotifier {
    pending: Vec<(String, String, String, NaiveDateTime)>,
}

impl NotificationService for PrintingNotifier {
    fn request_permission(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn schedule(&mut self, id: &str, title: &str, body: &str, at: NaiveDateTime) -> Result<()> {
        self.pending.retain(|(pending, ..)| pending != id);
        self.pending
            .push((id.to_string(), title.to_string(), body.to_string(), at));
        Ok(())
    }

    fn cancel(&mut self, id: &str) -> Result<()> {
        self.pending.retain(|(pending, ..)| pending != id);
        Ok(())
    }

    fn dispatch_due(&mut self, now: NaiveDateTime) -> Result<Vec<String>> {
        let (due, later): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|(.., at)| *at <= now);
        self.pending = later;
        Ok(due
            .into_iter()
            .map(|(id, title, body, _)| {
                log_block_start!("Notification: {}", title);
                log_indented!("{}", body);
                id
            })
            .collect())
    }

    fn next_due(&self) -> Option<NaiveDateTime> {
        self.pending.iter().map(|(.., at)| *at).min()
    }
}

pub fn handle_simulate_command(start_time: &str, end_time: &str, log_to_file: bool) -> Result<()> {
    let start = time_source::parse_datetime(start_time)
        .map_err(|e| anyhow::anyhow!("Invalid start time: {}", e))?;
    let end = time_source::parse_datetime(end_time)
        .map_err(|e| anyhow::anyhow!("Invalid end time: {}", e))?;
    if end <= start {
        anyhow::bail!("End time must be after start time");
    }

    let clock: Arc<dyn TimeSource> = Arc::new(SimulatedTimeSource::at(start));
    Log::set_simulated_clock(clock.clone());

    let _log_guard = if log_to_file {
        let file_name = format!(
            "hydrated-simulation-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        let guard = Log::start_file_logging(file_name.clone())?;
        println!("Writing simulation log to {file_name}");
        Some(guard)
    } else {
        None
    };

    log_version!();
    log_block_start!("Simulation Mode");
    let duration = end - start;
    log_decorated!(
        "Simulating from {} to {}",
        start.format("%Y-%m-%d %H:%M:%S"),
        end.format("%Y-%m-%d %H:%M:%S")
    );
    log_indented!(
        "Total simulated time: {} hours {} minutes",
        duration.num_hours(),
        duration.num_minutes() % 60
    );

    let config = config::load()?;
    config.log_config();
    let store = MemoryStore::copy_of(&FileStore::open_default())?;
    let session = HydrationSession::new(
        config,
        Box::new(store),
        Box::new(PrintingNotifier::default()),
        clock.clone(),
    );

    // Ctrl-C still stops a long simulation
    let signal_state = setup_signal_handler()?;

    Core::new(CoreParams {
        session,
        signal_state,
        clock,
        config_path: None,
        lock: None,
        end: Some(end),
    })
    .execute()
}
