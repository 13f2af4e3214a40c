//! Download snapshot - last-run totals per device
//!
//! The snapshot is a flat JSON object. Every device has a `<codename>` count
//! and a `<codename>_diff` delta; `_date`, `_total` and `_total_diff` hold the
//! run-wide values. Entries are only ever added or updated.
//!
//! Keys are kept in a `BTreeMap` so the file is always written key-sorted,
//! which keeps the committed history of the file readable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DATE_KEY: &str = "_date";
pub const TOTAL_KEY: &str = "_total";
pub const TOTAL_DIFF_KEY: &str = "_total_diff";
pub const DIFF_SUFFIX: &str = "_diff";

/// Per-device totals from the most recent run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, Value>,
}

/// A device row read back from a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub codename: String,
    pub count: i64,
    pub diff: i64,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot document
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Snapshot is not a flat JSON object")
    }

    /// Serialize with two-space indentation and sorted keys
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries).context("Failed to serialize snapshot")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Integer stored under `key`, or 0 when missing or not an integer
    pub fn count(&self, key: &str) -> i64 {
        match self.entries.get(key) {
            Some(value) => value.as_i64().unwrap_or_else(|| {
                warn!("Snapshot entry {} is not an integer: {}", key, value);
                0
            }),
            None => 0,
        }
    }

    pub fn set_count(&mut self, key: impl Into<String>, count: i64) {
        self.entries.insert(key.into(), Value::from(count));
    }

    pub fn set_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), Value::String(text.into()));
    }

    /// Timestamp of the run that wrote this snapshot
    pub fn date(&self) -> Option<&str> {
        self.entries.get(DATE_KEY).and_then(Value::as_str)
    }

    pub fn total(&self) -> i64 {
        self.count(TOTAL_KEY)
    }

    pub fn total_diff(&self) -> i64 {
        self.count(TOTAL_DIFF_KEY)
    }

    /// Device rows in key order, each paired with its `_diff` entry
    pub fn devices(&self) -> Vec<SnapshotEntry> {
        self.entries
            .keys()
            .filter(|key| !key.starts_with('_') && !key.ends_with(DIFF_SUFFIX))
            .map(|codename| SnapshotEntry {
                codename: codename.clone(),
                count: self.count(codename),
                diff: self.count(&diff_key(codename)),
            })
            .collect()
    }
}

/// `<codename>_diff`
pub fn diff_key(codename: &str) -> String {
    format!("{}{}", codename, DIFF_SUFFIX)
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot.
    ///
    /// A missing file is a first run and yields an empty snapshot; a file that
    /// exists but cannot be read or parsed is an error.
    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            warn!(
                "No snapshot at {:?}, starting from empty totals",
                self.path
            );
            return Ok(Snapshot::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot file: {:?}", self.path))?;

        let snapshot = Snapshot::from_json(&content)
            .with_context(|| format!("Failed to parse snapshot file: {:?}", self.path))?;

        debug!("Loaded {} snapshot entries from {:?}", snapshot.len(), self.path);
        Ok(snapshot)
    }

    /// Write the snapshot, replacing the old file in one rename
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let content = snapshot.to_json()?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory: {:?}", dir))?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;
        temp.write_all(content.as_bytes())
            .context("Failed to write snapshot contents")?;
        temp.as_file()
            .sync_all()
            .context("Failed to flush snapshot contents")?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to replace snapshot file: {:?}", self.path))?;

        info!("Saved snapshot to {:?}", self.path);
        Ok(())
    }
}
