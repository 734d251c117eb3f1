//! TaskState store.
//!
//! Persists one record per task in a single JSON document
//! (`.stageflow/state.json`). Every read reloads from disk so callers always
//! see the latest persisted state; there is no cache. Records are never
//! deleted, even after a task reaches the terminal phase.
//!
//! The store assumes exactly one caller mutates a given task at a time.
//! There is no locking or optimistic-concurrency check; concurrent mutation
//! from two callers is an unguarded hazard.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use stageflow_core::TaskState;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

const STATE_FILE: &str = "state.json";

/// Store for per-task workflow records backed by one JSON file.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            dir: config.stageflow_dir(),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the whole state file. Missing file means an empty store.
    pub fn load(&self) -> Result<BTreeMap<String, TaskState>> {
        let path = self.state_path();
        if !path.exists() {
            debug!(path = %path.display(), "No state file yet, starting empty");
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            EngineError::Operation(format!("Failed to parse state file {}: {}", path.display(), e))
        })
    }

    /// Persist the whole state file.
    pub fn save(&self, tasks: &BTreeMap<String, TaskState>) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        let content = serde_json::to_string_pretty(tasks)
            .map_err(|e| EngineError::Operation(format!("Failed to serialize state file: {}", e)))?;
        fs::write(self.state_path(), content)?;
        debug!(tasks = tasks.len(), "Saved state file");
        Ok(())
    }

    /// Fresh read of a single task's record.
    pub fn get(&self, task_id: &str) -> Result<TaskState> {
        self.load()?
            .remove(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))
    }

    pub fn exists(&self, task_id: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(task_id))
    }

    /// Insert or replace a task's record.
    pub fn upsert(&self, mut state: TaskState) -> Result<()> {
        let mut tasks = self.load()?;
        state.touch();
        tasks.insert(state.task_id.clone(), state);
        self.save(&tasks)
    }

    /// Mark the given task active and every other task inactive, in the same
    /// write. The active flag is a store-wide exclusive resource.
    pub fn set_active(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.load()?;
        if !tasks.contains_key(task_id) {
            return Err(EngineError::TaskNotFound(task_id.to_string()));
        }
        for (id, task) in tasks.iter_mut() {
            task.is_active = id == task_id;
        }
        self.save(&tasks)?;
        info!(task_id, "Marked task active");
        Ok(())
    }

    /// The currently active task, if any.
    pub fn active_task(&self) -> Result<Option<TaskState>> {
        Ok(self.load()?.into_values().find(|t| t.is_active))
    }
}
