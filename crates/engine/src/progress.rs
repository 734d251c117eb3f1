//! Step progress tracking for the coding phase.
//!
//! Coding is the one multi-step phase: its work is an ordered list of
//! execution-plan steps completed strictly in sequence. Finishing the last
//! step does not transition the phase; the next prompt asks for a completion
//! manifest and the usual submit-and-review cycle still applies.

use stageflow_core::{ReviewStep, WorkflowState};
use tracing::info;

use crate::artifact_store::ArtifactStore;
use crate::error::{EngineError, Result};
use crate::state_store::StateStore;

/// Outcome of a successful step completion.
#[derive(Debug, Clone)]
pub struct StepProgress {
    pub completed: String,
    pub current_step: usize,
    pub total_steps: usize,
}

impl StepProgress {
    pub fn all_complete(&self) -> bool {
        self.current_step >= self.total_steps
    }
}

/// Tracks ordered completion of execution steps.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    states: StateStore,
    artifacts: ArtifactStore,
}

impl ProgressTracker {
    pub fn new(states: StateStore, artifacts: ArtifactStore) -> Self {
        Self { states, artifacts }
    }

    /// Record completion of the step the task is currently on.
    ///
    /// Rejects out-of-order and duplicate completions: `step_id` must equal
    /// the plan step at `current_step`.
    pub fn complete_step(&self, task_id: &str, step_id: &str) -> Result<StepProgress> {
        let mut task = self.states.get(task_id)?;
        if task.current_state != WorkflowState::Coding(ReviewStep::Working) {
            return Err(EngineError::Operation(format!(
                "step completion is only valid in coding_working, task is in '{}'",
                task.current_state
            )));
        }

        let plan = self.artifacts.read_archived_plan(task_id)?;
        let expected = plan.step_at(task.current_step).ok_or_else(|| {
            EngineError::Operation(format!(
                "all {} steps are already completed; submit the completion manifest",
                plan.len()
            ))
        })?;

        if expected.id != step_id {
            return Err(EngineError::StepOutOfOrder {
                expected: expected.id.clone(),
                got: step_id.to_string(),
            });
        }

        task.completed_steps.push(step_id.to_string());
        task.current_step += 1;
        let progress = StepProgress {
            completed: step_id.to_string(),
            current_step: task.current_step,
            total_steps: plan.len(),
        };
        self.states.upsert(task)?;

        info!(
            task_id,
            step_id,
            current_step = progress.current_step,
            total = progress.total_steps,
            "Completed execution step"
        );
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use stageflow_core::{ExecutionPlan, ExecutionStep, Phase, TaskState};
    use tempfile::TempDir;

    fn plan() -> ExecutionPlan {
        ExecutionPlan {
            steps: vec![
                ExecutionStep {
                    id: "STEP-001".to_string(),
                    instruction: "first".to_string(),
                    affected_locations: vec![],
                    depends_on: vec![],
                },
                ExecutionStep {
                    id: "STEP-002".to_string(),
                    instruction: "second".to_string(),
                    affected_locations: vec![],
                    depends_on: vec!["STEP-001".to_string()],
                },
            ],
        }
    }

    fn setup(temp: &TempDir) -> ProgressTracker {
        let config = EngineConfig::new(temp.path());
        let states = StateStore::new(&config);
        let artifacts = ArtifactStore::new(&config);

        let mut task = TaskState::new("TASK-1");
        task.current_state = WorkflowState::Coding(ReviewStep::Working);
        states.upsert(task).unwrap();

        artifacts.write_live("TASK-1", "plan text").unwrap();
        artifacts
            .archive("TASK-1", Phase::Planning, Some(&plan()))
            .unwrap();

        ProgressTracker::new(states, artifacts)
    }

    #[test]
    fn test_steps_complete_in_order() {
        let temp = TempDir::new().unwrap();
        let tracker = setup(&temp);

        let p1 = tracker.complete_step("TASK-1", "STEP-001").unwrap();
        assert_eq!(p1.current_step, 1);
        assert!(!p1.all_complete());

        let p2 = tracker.complete_step("TASK-1", "STEP-002").unwrap();
        assert_eq!(p2.current_step, 2);
        assert!(p2.all_complete());

        let task = tracker.states.get("TASK-1").unwrap();
        assert_eq!(task.completed_steps, vec!["STEP-001", "STEP-002"]);
    }

    #[test]
    fn test_out_of_order_step_rejected() {
        let temp = TempDir::new().unwrap();
        let tracker = setup(&temp);

        let err = tracker.complete_step("TASK-1", "STEP-002").unwrap_err();
        assert!(matches!(err, EngineError::StepOutOfOrder { .. }));

        // Nothing persisted.
        let task = tracker.states.get("TASK-1").unwrap();
        assert_eq!(task.current_step, 0);
        assert!(task.completed_steps.is_empty());
    }

    #[test]
    fn test_duplicate_completion_rejected() {
        let temp = TempDir::new().unwrap();
        let tracker = setup(&temp);
        tracker.complete_step("TASK-1", "STEP-001").unwrap();

        let err = tracker.complete_step("TASK-1", "STEP-001").unwrap_err();
        assert!(matches!(err, EngineError::StepOutOfOrder { .. }));
    }

    #[test]
    fn test_completion_past_end_rejected() {
        let temp = TempDir::new().unwrap();
        let tracker = setup(&temp);
        tracker.complete_step("TASK-1", "STEP-001").unwrap();
        tracker.complete_step("TASK-1", "STEP-002").unwrap();

        assert!(tracker.complete_step("TASK-1", "STEP-003").is_err());
    }

    #[test]
    fn test_rejected_outside_coding_working() {
        let temp = TempDir::new().unwrap();
        let tracker = setup(&temp);
        let mut task = tracker.states.get("TASK-1").unwrap();
        task.current_state = WorkflowState::Coding(ReviewStep::AiReview);
        tracker.states.upsert(task).unwrap();

        assert!(tracker.complete_step("TASK-1", "STEP-001").is_err());
    }
}
