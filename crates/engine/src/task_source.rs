//! Local file task source.
//!
//! Minimal `TaskSource` implementation backed by a JSON file holding a list
//! of task-detail records. Issue-tracker providers live outside this crate;
//! the engine only depends on the `TaskSource` contract.

use std::fs;
use std::path::PathBuf;

use stageflow_core::{CoreError, TaskDetail, TaskSource, TaskStatus};
use tracing::debug;

use crate::config::EngineConfig;

/// Task source reading `.stageflow/tasks.json`.
#[derive(Debug, Clone)]
pub struct LocalTaskSource {
    path: PathBuf,
}

impl LocalTaskSource {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            path: config.tasks_path(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Vec<TaskDetail>, CoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No tasks file, source is empty");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| CoreError::Source(format!("failed to read tasks file: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::Source(format!("failed to parse tasks file: {e}")))
    }
}

impl TaskSource for LocalTaskSource {
    fn task_detail(&self, task_id: &str) -> Result<TaskDetail, CoreError> {
        self.load()?
            .into_iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    fn open_tasks(&self) -> Result<Vec<TaskDetail>, CoreError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|t| t.status != TaskStatus::Done)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TASKS: &str = r#"[
        {"id": "TASK-1", "summary": "one", "description": "first task", "status": "open"},
        {"id": "TASK-2", "summary": "two", "description": "second task", "status": "done"},
        {"id": "TASK-3", "summary": "three", "description": "third task",
         "acceptance_criteria": ["works"], "status": "in_progress"}
    ]"#;

    fn source(temp: &TempDir) -> LocalTaskSource {
        let path = temp.path().join("tasks.json");
        fs::write(&path, TASKS).unwrap();
        LocalTaskSource::from_path(path)
    }

    #[test]
    fn test_task_detail_lookup() {
        let temp = TempDir::new().unwrap();
        let source = source(&temp);

        let task = source.task_detail("TASK-3").unwrap();
        assert_eq!(task.summary, "three");
        assert_eq!(task.acceptance_criteria, vec!["works"]);

        assert!(matches!(
            source.task_detail("TASK-9"),
            Err(CoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_open_tasks_excludes_done() {
        let temp = TempDir::new().unwrap();
        let source = source(&temp);

        let open = source.open_tasks().unwrap();
        let ids: Vec<_> = open.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["TASK-1", "TASK-3"]);
    }

    #[test]
    fn test_missing_file_is_empty_source() {
        let temp = TempDir::new().unwrap();
        let source = LocalTaskSource::from_path(temp.path().join("absent.json"));
        assert!(source.open_tasks().unwrap().is_empty());
    }
}
