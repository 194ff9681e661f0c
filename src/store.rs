//! Key-value persistence for the hydration snapshot and nudge bookkeeping.
//!
//! The store only knows strings. The consumption snapshot is one JSON blob
//! under [`KEY_STATE`]; nudge tokens and timestamps are small scalar keys.
//! Reading merges the stored object over a freshly built default state, so
//! missing or unknown fields never fail a load.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::common::constants::*;
use crate::state::ConsumptionState;

/// Every key written by the session.
pub const PERSISTED_KEYS: [&str; 8] = [
    KEY_STATE,
    KEY_MORNING_RESET,
    KEY_EARLY_NUDGE,
    KEY_LATE_NUDGE,
    KEY_PRAISE,
    KEY_EARLY_FIRED_AT,
    KEY_LAST_OPENED,
    KEY_LAST_LOG_AT,
];

/// Format used for persisted timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Resolve the directory holding persisted state.
///
/// `$XDG_STATE_HOME/hydrated`, falling back to `~/.local/state/hydrated`.
pub fn get_state_dir() -> PathBuf {
    let state_home = std::env::var("XDG_STATE_HOME")
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local/state")
        });
    state_home.join(APP_NAME)
}

/// One file per key, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        Self::new(get_state_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(file_name)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory {}", self.dir.display()))?;

        let mut temp = NamedTempFile::new_in(&self.dir)
            .context("Failed to create temporary state file")?;
        temp.write_all(value.as_bytes())
            .context("Failed to write temporary state file")?;
        temp.as_file().sync_all().ok();

        let path = self.path_for(key);
        temp.persist(&path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// In-memory store for tests and one-shot dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    /// When set, every write fails. Used to exercise best-effort persistence.
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every key hydrated persists from `source`, for dry runs on real data.
    pub fn copy_of(source: &dyn KeyValueStore) -> Result<Self> {
        let mut copy = Self::new();
        for key in PERSISTED_KEYS {
            if let Some(value) = source.get(key)? {
                copy.entries.insert(key.to_string(), value);
            }
        }
        Ok(copy)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("write rejected for key '{}'", key);
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("remove rejected for key '{}'", key);
        }
        self.entries.remove(key);
        Ok(())
    }
}

/// Load the snapshot, shallow-merging stored fields over `defaults`.
///
/// Returns `Ok(None)` when nothing was stored. A blob that is not a JSON
/// object, or whose fields do not fit the schema, is an error; callers fall
/// back to defaults.
pub fn load_state(
    store: &dyn KeyValueStore,
    defaults: &ConsumptionState,
) -> Result<Option<ConsumptionState>> {
    let Some(raw) = store.get(KEY_STATE)? else {
        return Ok(None);
    };

    let stored: serde_json::Value =
        serde_json::from_str(&raw).context("Stored hydration state is not valid JSON")?;
    let serde_json::Value::Object(stored) = stored else {
        anyhow::bail!("Stored hydration state is not a JSON object");
    };

    let mut merged = serde_json::to_value(defaults).context("Failed to encode default state")?;
    if let serde_json::Value::Object(base) = &mut merged {
        for (key, value) in stored {
            // A stored null never replaces a non-null default
            if !value.is_null() || base.get(&key).is_some_and(|v| v.is_null()) {
                base.insert(key, value);
            }
        }
    }

    let state: ConsumptionState =
        serde_json::from_value(merged).context("Stored hydration state has invalid fields")?;
    Ok(Some(state.sanitized()))
}

pub fn save_state(store: &mut dyn KeyValueStore, state: &ConsumptionState) -> Result<()> {
    let json = serde_json::to_string(state).context("Failed to encode hydration state")?;
    store.set(KEY_STATE, &json)
}

pub fn load_timestamp(store: &dyn KeyValueStore, key: &str) -> Option<NaiveDateTime> {
    store
        .get(key)
        .ok()
        .flatten()
        .and_then(|raw| NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok())
}

pub fn save_timestamp(store: &mut dyn KeyValueStore, key: &str, at: NaiveDateTime) -> Result<()> {
    store.set(key, &at.format(TIMESTAMP_FORMAT).to_string())
}

pub fn load_token(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    store
        .get(key)
        .ok()
        .flatten()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
