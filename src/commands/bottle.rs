//! `switch` and `goal`: change the bottle or the daily goal.
//!
//! Both settings live in the config file too, so the new value is written
//! there first (which also validates it) and then applied to today's state.
//! A running daemon picks up the file change through its watcher.

use anyhow::Result;

use crate::args::Command;
use crate::common::utils::private_path;
use crate::config;
use crate::session::HydrationSession;

use super::intake::report_outcome;

pub fn handle_switch(session: &mut HydrationSession, bottle_ml: u32) -> Result<()> {
    log_version!();
    let path = config::get_config_path()?;
    config::update_setting(&path, "bottle_ml", &bottle_ml.to_string())?;
    log_block_start!("Bottle set to {} ml in {}", bottle_ml, private_path(&path));

    let outcome = session.switch_bottle(bottle_ml);
    session.apply_config(config::load_from_path(&path)?);
    report_outcome(session, &Command::Switch(bottle_ml), &outcome);
    Ok(())
}

pub fn handle_goal(session: &mut HydrationSession, goal_ml: u32) -> Result<()> {
    log_version!();
    let path = config::get_config_path()?;
    config::update_setting(&path, "goal_ml", &goal_ml.to_string())?;
    log_block_start!("Goal set to {} ml in {}", goal_ml, private_path(&path));

    let outcome = session.set_goal(goal_ml);
    session.apply_config(config::load_from_path(&path)?);
    report_outcome(session, &Command::Goal(goal_ml), &outcome);
    Ok(())
}
