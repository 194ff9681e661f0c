//! Configuration file building and in-place updates.
//!
//! The default file is assembled by `ConfigBuilder` so every setting carries
//! an aligned comment. `update_setting` rewrites a single value while keeping
//! the line's comment and spacing intact.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a commented default configuration to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let content = default_config_text();
    fs::write(path, content)
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;

    log_block_start!("Created default configuration");
    log_indented!("{}", private_path(path));
    Ok(())
}

pub(crate) fn default_config_text() -> String {
    let mut text = ConfigBuilder::new()
        .add_section("Schedule")
        .add_setting(
            "wake",
            &format!("\"{DEFAULT_WAKE}\""),
            "Start of the hydration window and of each tracking day",
        )
        .add_setting(
            "sleep",
            &format!("\"{DEFAULT_SLEEP}\""),
            "End of the hydration window (<= wake means the next day)",
        )
        .add_section("Goal")
        .add_setting(
            "goal_ml",
            &DEFAULT_GOAL_ML.to_string(),
            &format!("Daily goal in ml ({MINIMUM_GOAL_ML}-{MAXIMUM_GOAL_ML})"),
        )
        .add_setting(
            "bottle_ml",
            &DEFAULT_BOTTLE_ML.to_string(),
            &format!("Volume of the tracked bottle in ml ({MINIMUM_BOTTLE_ML}-{MAXIMUM_BOTTLE_ML})"),
        )
        .add_section("Behavior")
        .add_setting(
            "snap",
            "\"continuous\"",
            "Level rounding: continuous, percent, tenths, quarters",
        )
        .add_setting(
            "nudges",
            &DEFAULT_NUDGES.to_string(),
            "Schedule reminder and praise notifications",
        )
        .add_section("Estimation")
        .add_setting(
            "estimation_endpoint",
            "\"\"",
            "Fill estimation service URL (empty disables `estimate`)",
        )
        .add_setting(
            "estimation_timeout_secs",
            &DEFAULT_ESTIMATION_TIMEOUT_SECS.to_string(),
            &format!(
                "Request timeout in seconds ({MINIMUM_ESTIMATION_TIMEOUT_SECS}-{MAXIMUM_ESTIMATION_TIMEOUT_SECS})"
            ),
        )
        .build();
    text.push('\n');
    text
}

/// Set `key = value` in the config file, appending the line if the key is absent.
///
/// `value` is written verbatim, so strings must already be quoted.
pub fn update_setting(path: &Path, key: &str, value: &str) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let updated = match find_config_line(&content, key) {
        Some(line) => {
            let replacement = preserve_comment_formatting(&line, key, value);
            content.replacen(&line, &replacement, 1)
        }
        None => {
            let separator = if content.ends_with('\n') || content.is_empty() { "" } else { "\n" };
            format!("{content}{separator}{key} = {value}\n")
        }
    };

    // Refuse to leave behind a file that no longer loads
    super::loading::parse_config(&updated)
        .with_context(|| format!("Refusing to write invalid value for {key}"))?;

    if updated != content {
        fs::write(path, updated)
            .with_context(|| format!("Failed to write config to {}", private_path(path)))?;
    }
    Ok(())
}

/// Builder for creating properly formatted configuration files.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    /// Render all entries, aligning comments one column past the longest setting.
    fn build(self) -> String {
        let comment_column = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(title);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(comment_column - line.len());
                    lines.push(format!("{line}{padding}{comment}"));
                }
            }
        }
        lines.join("\n")
    }
}

/// Find the uncommented line assigning exactly `key`.
pub(crate) fn find_config_line(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .find(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        })
        .map(str::to_string)
}

/// Replace a line's value while keeping the spacing before its comment.
pub(crate) fn preserve_comment_formatting(original_line: &str, key: &str, new_value: &str) -> String {
    let key_value_part = format!("{key} = {new_value}");

    let Some(comment_pos) = original_line.find('#') else {
        return key_value_part;
    };
    let before_comment = &original_line[..comment_pos];
    let spacing = before_comment
        .rfind(|c: char| !c.is_whitespace())
        .map(|last| &before_comment[last + 1..])
        .filter(|gap| !gap.is_empty())
        .unwrap_or(" ");
    format!("{key_value_part}{spacing}{}", &original_line[comment_pos..])
}
