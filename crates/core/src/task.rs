//! Task records and the task-source collaborator contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::plan::ExecutionPlan;
use crate::state::{GatherStep, WorkflowState};

/// Per-task workflow record. One exists per task that has ever been begun;
/// records are never deleted, even after the terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    /// Composite `"<phase>_<substate>"` position; sole source of truth.
    pub current_state: WorkflowState,
    /// Feedback from the most recent rejection. Overwritten on the next
    /// rejection, consumed into the next generated prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_feedback: Option<String>,
    /// Set when the task enters a new phase; cleared once that phase's first
    /// working prompt has been generated. Re-entry via revision does not set
    /// it again.
    #[serde(default)]
    pub fresh_session_pending: bool,
    /// At most one task across the whole store has this set.
    #[serde(default)]
    pub is_active: bool,
    /// Zero-based index into the execution plan; meaningful only while the
    /// coding phase is in progress.
    #[serde(default)]
    pub current_step: usize,
    /// Ordered log of completed step ids, reset when coding is (re)entered.
    #[serde(default)]
    pub completed_steps: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskState {
    /// Fresh record for a task being begun for the first time.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            current_state: WorkflowState::GatherRequirements(GatherStep::Working),
            revision_feedback: None,
            fresh_session_pending: true,
            is_active: false,
            current_step: 0,
            completed_steps: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Clear step progress, used whenever the coding phase is (re)entered.
    pub fn reset_steps(&mut self) {
        self.current_step = 0;
        self.completed_steps.clear();
    }

    /// Take the pending revision feedback, leaving none behind.
    pub fn take_feedback(&mut self) -> Option<String> {
        self.revision_feedback.take()
    }
}

/// Status of a task as reported by its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

/// Task-detail record consumed from a task-source collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: String,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
}

/// Provider of task details (local file, issue tracker, ...).
///
/// Providers beyond the record they return are external collaborators; the
/// engine only relies on this contract.
pub trait TaskSource {
    fn task_detail(&self, task_id: &str) -> Result<TaskDetail, CoreError>;

    /// Tasks not yet completed, in source order.
    fn open_tasks(&self) -> Result<Vec<TaskDetail>, CoreError>;
}

/// Payload submitted for the currently active sub-state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkSubmission {
    /// Human-readable artifact content.
    pub content: String,
    /// Structured execution plan; required exactly at the planning phase's
    /// execution-plan stage and rejected anywhere else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<ExecutionPlan>,
}

impl WorkSubmission {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            execution_plan: None,
        }
    }

    pub fn with_plan(content: impl Into<String>, plan: ExecutionPlan) -> Self {
        Self {
            content: content.into(),
            execution_plan: Some(plan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_state_starts_at_requirements() {
        let state = TaskState::new("TASK-7");
        assert_eq!(state.current_state.to_string(), "gatherrequirements_working");
        assert!(state.fresh_session_pending);
        assert!(!state.is_active);
        assert_eq!(state.current_step, 0);
        assert!(state.completed_steps.is_empty());
    }

    #[test]
    fn test_take_feedback_consumes() {
        let mut state = TaskState::new("TASK-7");
        state.revision_feedback = Some("tighten the scope".to_string());
        assert_eq!(state.take_feedback().as_deref(), Some("tighten the scope"));
        assert!(state.revision_feedback.is_none());
    }

    #[test]
    fn test_task_state_serde_uses_state_string() {
        let state = TaskState::new("TASK-7");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["current_state"], "gatherrequirements_working");
        assert_eq!(json["task_id"], "TASK-7");
    }

    #[test]
    fn test_reset_steps() {
        let mut state = TaskState::new("TASK-7");
        state.current_step = 3;
        state.completed_steps = vec!["STEP-001".to_string()];
        state.reset_steps();
        assert_eq!(state.current_step, 0);
        assert!(state.completed_steps.is_empty());
    }
}
