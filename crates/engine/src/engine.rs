//! Workflow engine façade.
//!
//! The operations exposed to the orchestration layer: begin/resume,
//! submit-work, review decisions, phase advancement, step completion, and
//! inspect/force-transition. Each operation loads fresh state, validates
//! before persisting anything (no partial transition is ever saved), and
//! answers with the next instruction prompt.

use serde::Serialize;
use stageflow_core::{
    Phase, PlanningStage, PlanningStep, TaskDetail, TaskSource, TaskState, Trigger,
    WorkSubmission, WorkflowState,
};
use tracing::{info, warn};

use crate::artifact_store::ArtifactStore;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::machine::StateMachine;
use crate::progress::ProgressTracker;
use crate::prompts::PromptGenerator;
use crate::state_store::StateStore;

/// Answer returned by every mutating engine operation.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    pub task_id: String,
    pub state: String,
    pub valid_triggers: Vec<String>,
    pub prompt: String,
}

/// Read-only snapshot of a task's workflow position.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInspection {
    pub task: TaskState,
    pub valid_triggers: Vec<String>,
}

/// Composes the state machine, stores, and prompt generator into the
/// workflow contract. Constructed explicitly per process; holds no global
/// state.
pub struct WorkflowEngine {
    config: EngineConfig,
    machine: StateMachine,
    states: StateStore,
    artifacts: ArtifactStore,
    prompts: PromptGenerator,
    progress: ProgressTracker,
    source: Box<dyn TaskSource>,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig, source: Box<dyn TaskSource>) -> Self {
        let states = StateStore::new(&config);
        let artifacts = ArtifactStore::new(&config);
        Self {
            machine: StateMachine::new(),
            states: states.clone(),
            prompts: PromptGenerator::new(&config, artifacts.clone()),
            progress: ProgressTracker::new(states, artifacts.clone()),
            artifacts,
            config,
            source,
        }
    }

    /// Begin a task for the first time, or resume it where it left off.
    /// Either way the task becomes the store's single active task.
    pub fn begin_or_resume(&self, task_id: &str) -> Result<EngineResponse> {
        // The task must exist at the source before a workflow record is made.
        let detail = self.source.task_detail(task_id)?;

        if !self.states.exists(task_id)? {
            let task = TaskState::new(task_id);
            self.artifacts.init_live(task_id, task.current_state.phase())?;
            self.states.upsert(task)?;
            info!(task_id, summary = %detail.summary, "Began new task");
        }
        self.states.set_active(task_id)?;

        let task = self.states.get(task_id)?;
        self.finish(task)
    }

    /// Persist submitted work and move it into review.
    ///
    /// The payload is validated against the active sub-state's schema before
    /// any persistence: non-empty content everywhere, and a structured
    /// execution plan required at (and only at) the execution-plan stage.
    pub fn submit_work(&self, task_id: &str, submission: &WorkSubmission) -> Result<EngineResponse> {
        let mut task = self.states.get(task_id)?;
        let state = task.current_state;

        // Transition first: an invalid state blocks the call with no mutation.
        let next = self.machine.fire(state, Trigger::SubmitForAiReview)?;

        if submission.content.trim().is_empty() {
            return Err(EngineError::InvalidArtifact(
                "submission content is empty".to_string(),
            ));
        }
        let at_execution_plan =
            state == WorkflowState::Planning(PlanningStep::Stage(PlanningStage::ExecutionPlan));
        match (&submission.execution_plan, at_execution_plan) {
            (None, true) => {
                return Err(EngineError::InvalidArtifact(
                    "the execution-plan stage requires a structured plan".to_string(),
                ))
            }
            (Some(plan), true) => plan.validate()?,
            (Some(_), false) => {
                return Err(EngineError::InvalidArtifact(
                    "a structured plan is only accepted at the execution-plan stage".to_string(),
                ))
            }
            (None, false) => {}
        }

        // Planning accumulates from its second stage onward; everything else
        // replaces. A resubmission after revision replaces the stage's own
        // section instead of appending a duplicate.
        match state {
            WorkflowState::Planning(PlanningStep::Stage(stage)) if !stage.is_first() => self
                .artifacts
                .upsert_live_section(task_id, stage.heading(), &submission.content)?,
            _ => self.artifacts.write_live(task_id, &submission.content)?,
        }
        if let Some(plan) = &submission.execution_plan {
            self.artifacts.write_plan_draft(task_id, plan)?;
        }

        task.current_state = next;
        info!(task_id, from = %state, to = %next, "Submitted work");
        self.finish(task)
    }

    /// Record a review outcome: approval moves the workflow forward,
    /// rejection fires `request_revision` and stores the feedback for the
    /// next working prompt.
    pub fn review_decision(
        &self,
        task_id: &str,
        approved: bool,
        feedback: Option<String>,
    ) -> Result<EngineResponse> {
        let mut task = self.states.get(task_id)?;
        let state = task.current_state;

        let trigger = if !approved {
            Trigger::RequestRevision
        } else if state.is_ai_review() {
            Trigger::AiApproves
        } else {
            Trigger::HumanApproves
        };
        let next = self.machine.fire(state, trigger)?;

        if !approved {
            task.revision_feedback = feedback;
            // A cross-phase revision destination (testing → coding) re-enters
            // the multi-step phase: step progress restarts and the live
            // artifact belongs to the destination phase again.
            if next.phase() != state.phase() {
                self.artifacts.init_live(task_id, next.phase())?;
                task.reset_steps();
            }
        }

        task.current_state = next;
        info!(task_id, from = %state, to = %next, approved, "Recorded review decision");
        self.finish(task)
    }

    /// Archive the completed phase and advance into the next one. Only valid
    /// from a verified state; the scaffolding feature flag decides the exit
    /// taken from `planning_verified`.
    pub fn advance_phase(&self, task_id: &str) -> Result<EngineResponse> {
        let mut task = self.states.get(task_id)?;
        let state = task.current_state;

        let trigger = self
            .machine
            .advance_trigger(state, &self.config)
            .ok_or_else(|| EngineError::invalid_transition(state, Trigger::Advance))?;
        let next = self.machine.fire(state, trigger)?;

        let completed = state.phase();
        let twin = if completed == Phase::Planning {
            Some(self.artifacts.read_plan_draft(task_id)?)
        } else {
            None
        };
        self.artifacts.archive(task_id, completed, twin.as_ref())?;

        if next != WorkflowState::Done {
            self.artifacts.init_live(task_id, next.phase())?;
        }
        if next.phase() == Phase::Coding {
            task.reset_steps();
        }
        // First entry into the new phase gets the fresh-session notice.
        task.fresh_session_pending = next != WorkflowState::Done;
        task.revision_feedback = None;

        task.current_state = next;
        info!(task_id, from = %state, to = %next, trigger = %trigger, "Advanced phase");
        self.finish(task)
    }

    /// Mark the current execution step complete and return the prompt for
    /// the next one (or the completion-manifest instruction).
    pub fn complete_step(&self, task_id: &str, step_id: &str) -> Result<EngineResponse> {
        self.progress.complete_step(task_id, step_id)?;
        let task = self.states.get(task_id)?;
        self.finish(task)
    }

    /// Read-only snapshot; never mutates and never consumes feedback.
    pub fn inspect_state(&self, task_id: &str) -> Result<TaskInspection> {
        let task = self.states.get(task_id)?;
        let valid_triggers = self.trigger_names(task.current_state);
        Ok(TaskInspection {
            task,
            valid_triggers,
        })
    }

    /// Write the target state directly, bypassing the transition table and
    /// all payload validation. Expert-only manual recovery: misuse can
    /// corrupt downstream phase assumptions.
    pub fn force_transition(&self, task_id: &str, target: &str) -> Result<TaskInspection> {
        let state: WorkflowState = target.parse()?;
        let mut task = self.states.get(task_id)?;
        warn!(task_id, from = %task.current_state, to = %state, "Forced transition, skipping validation");
        task.current_state = state;
        self.states.upsert(task)?;
        self.inspect_state(task_id)
    }

    /// Tasks the source still considers open.
    pub fn open_tasks(&self) -> Result<Vec<TaskDetail>> {
        Ok(self.source.open_tasks()?)
    }

    /// Triggers the caller can actually fire next. The machine's table lists
    /// both planning exits; only the one selected by the scaffolding flag is
    /// reported.
    fn trigger_names(&self, state: WorkflowState) -> Vec<String> {
        self.machine
            .valid_triggers(state)
            .into_iter()
            .filter(|t| match t {
                Trigger::AdvanceToScaffold | Trigger::AdvanceToCode => {
                    self.machine.advance_trigger(state, &self.config) == Some(*t)
                }
                _ => true,
            })
            .map(|t| t.to_string())
            .collect()
    }

    /// Persist the task, build the next prompt, and discard the one-shot
    /// prompt inputs (revision feedback, fresh-session marker) that were
    /// just read into it.
    fn finish(&self, task: TaskState) -> Result<EngineResponse> {
        self.states.upsert(task.clone())?;

        let detail = self.source.task_detail(&task.task_id)?;
        let prompt = self.prompts.generate(&detail, &task)?;

        let mut consumed = task.clone();
        if consumed.current_state.is_submittable() && consumed.revision_feedback.is_some() {
            consumed.take_feedback();
        }
        consumed.fresh_session_pending = false;
        if consumed.revision_feedback != task.revision_feedback || task.fresh_session_pending {
            self.states.upsert(consumed)?;
        }

        Ok(EngineResponse {
            task_id: task.task_id.clone(),
            state: task.current_state.to_string(),
            valid_triggers: self.trigger_names(task.current_state),
            prompt,
        })
    }
}
