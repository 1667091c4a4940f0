use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use habit_domain::{ChangeSink, Habit, HabitChange};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    habits: Vec<Habit>,
}

/// Whole-collection JSON snapshot on disk, rewritten after every change.
pub struct JsonStore {
    path: PathBuf,
    last_error: Mutex<Option<String>>,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_error: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty collection.
    pub fn load(&self) -> Result<Vec<Habit>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no store yet");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let file: StoreFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        anyhow::ensure!(
            file.version == STORE_VERSION,
            "unsupported store version {} in {}",
            file.version,
            self.path.display()
        );
        Ok(file.habits)
    }

    pub fn save(&self, habits: &[Habit]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(&StoreFile {
            version: STORE_VERSION,
            habits: habits.to_vec(),
        })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), habit_count = habits.len(), "store written");
        Ok(())
    }

    /// Surface a commit failure recorded by the sink, clearing it.
    pub fn take_error(&self) -> Result<()> {
        match self.last_error.lock().take() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

impl ChangeSink for JsonStore {
    fn record(&self, change: &HabitChange, habits: &[Habit]) {
        if let Err(err) = self.save(habits) {
            error!(habit = %change.habit_id(), %err, "failed to persist habits");
            *self.last_error.lock() = Some(format!("{err:#}"));
        }
    }
}
