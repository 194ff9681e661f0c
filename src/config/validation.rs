//! Configuration validation functionality.
//!
//! Rejects values that would make pacing or rollover meaningless: unparseable
//! times, a zero-length window, goals and bottles outside sane ranges.

use anyhow::{Context, Result};

use super::Config;
use crate::common::constants::*;
use crate::common::utils::parse_minutes;

pub fn validate_config(config: &Config) -> Result<()> {
    let wake = match &config.wake {
        Some(value) => parse_minutes(value).context("wake must be a time in HH:MM format")?,
        None => parse_minutes(DEFAULT_WAKE)?,
    };
    let sleep = match &config.sleep {
        Some(value) => parse_minutes(value).context("sleep must be a time in HH:MM format")?,
        None => parse_minutes(DEFAULT_SLEEP)?,
    };
    if wake == sleep {
        anyhow::bail!(
            "wake and sleep cannot be the same time ({})",
            config.wake.as_deref().unwrap_or(DEFAULT_WAKE)
        );
    }

    if let Some(goal) = config.goal_ml {
        validate_goal(goal).with_context(|| format!("Invalid goal_ml ({goal})"))?;
    }
    if let Some(bottle) = config.bottle_ml {
        validate_bottle(bottle).with_context(|| format!("Invalid bottle_ml ({bottle})"))?;
    }

    if let Some(timeout) = config.estimation_timeout_secs
        && !(MINIMUM_ESTIMATION_TIMEOUT_SECS..=MAXIMUM_ESTIMATION_TIMEOUT_SECS).contains(&timeout)
    {
        anyhow::bail!(
            "estimation_timeout_secs ({}) must be between {} and {} seconds",
            timeout,
            MINIMUM_ESTIMATION_TIMEOUT_SECS,
            MAXIMUM_ESTIMATION_TIMEOUT_SECS
        );
    }

    if let Some(endpoint) = config.endpoint()
        && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        anyhow::bail!(
            "estimation_endpoint must be an http:// or https:// URL (got '{}')",
            endpoint
        );
    }

    Ok(())
}

/// Range check shared by the `goal` command and config loading.
pub fn validate_goal(goal_ml: u32) -> Result<()> {
    if !(MINIMUM_GOAL_ML..=MAXIMUM_GOAL_ML).contains(&goal_ml) {
        anyhow::bail!(
            "Goal must be between {} and {} ml",
            MINIMUM_GOAL_ML,
            MAXIMUM_GOAL_ML
        );
    }
    Ok(())
}

/// Range check shared by the `switch` command and config loading.
pub fn validate_bottle(bottle_ml: u32) -> Result<()> {
    if !(MINIMUM_BOTTLE_ML..=MAXIMUM_BOTTLE_ML).contains(&bottle_ml) {
        anyhow::bail!(
            "Bottle size must be between {} and {} ml",
            MINIMUM_BOTTLE_ML,
            MAXIMUM_BOTTLE_ML
        );
    }
    Ok(())
}
