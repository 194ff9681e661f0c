//! `estimate <image>`: read the bottle level from a photo.
//!
//! Ctrl-C cancels the request. A cancelled estimate changes nothing and
//! prints nothing beyond a short note; service errors are shown as-is.

use anyhow::{Context, Result};
use signal_hook::consts::signal::SIGINT;
use signal_hook::iterator::Signals;
use std::path::Path;
use std::thread;

use crate::args::Command;
use crate::estimate::{EstimateError, EstimationClient, image::image_data_url};
use crate::session::HydrationSession;

use super::intake::report_outcome;

pub fn handle_estimate(session: &mut HydrationSession, image: &Path) -> Result<()> {
    log_version!();

    let Some(endpoint) = session.config().endpoint().map(str::to_string) else {
        log_pipe!();
        log_warning!("No estimation endpoint configured");
        log_indented!("Set estimation_endpoint in hydrated.toml to enable `estimate`");
        return Ok(());
    };
    let timeout = session.config().estimation_timeout();
    let data_url = image_data_url(image)?;
    let client = EstimationClient::over_http(&endpoint, timeout)?;

    let token = session.begin_estimate();
    let mut signals = Signals::new([SIGINT]).context("failed to register interrupt handler")?;
    let signal_handle = signals.handle();
    let interrupt_token = token.clone();
    let interrupt_thread = thread::spawn(move || {
        if signals.forever().next().is_some() {
            interrupt_token.cancel();
        }
    });

    log_block_start!("Estimating fill level...");
    let result = session.estimate_with(&client, &data_url, &token);

    signal_handle.close();
    let _ = interrupt_thread.join();

    match result {
        Ok(outcome) => {
            report_outcome(session, &Command::Estimate(image.to_path_buf()), &outcome);
            Ok(())
        }
        Err(EstimateError::Cancelled) => {
            log_block_start!("Estimation cancelled, level unchanged");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
