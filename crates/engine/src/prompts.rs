//! Prompt generation.
//!
//! Builds the next instruction text for a task by combining the resolved
//! template, injected prior-phase context, the submitted artifact (for
//! review states), step details (for the coding phase), and any pending
//! revision feedback.

use stageflow_core::{ExecutionPlan, ReviewStep, TaskDetail, TaskState, WorkflowState};
use tracing::debug;

use crate::artifact_store::ArtifactStore;
use crate::config::EngineConfig;
use crate::context::ContextResolver;
use crate::error::Result;
use crate::templates::{render, template_keys, TemplateResolver, CODING_MANIFEST_KEY};

/// Prepended exactly once per phase, on the phase's very first
/// working/initial sub-state.
pub const FRESH_SESSION_NOTICE: &str = "> **Note:** Start a fresh session for this phase. \
Do not assume any earlier conversation context; everything needed is in this prompt.";

/// Substituted for `{{feedback}}` when no rejection is pending.
pub const NO_FEEDBACK_PLACEHOLDER: &str =
    "No reviewer feedback; produce the initial artifact.";

/// Generates state-appropriate instruction prompts.
#[derive(Debug, Clone)]
pub struct PromptGenerator {
    artifacts: ArtifactStore,
    context: ContextResolver,
    templates: TemplateResolver,
}

impl PromptGenerator {
    pub fn new(config: &EngineConfig, artifacts: ArtifactStore) -> Self {
        Self {
            context: ContextResolver::new(artifacts.clone()),
            templates: TemplateResolver::new(config),
            artifacts,
        }
    }

    /// Build the prompt for the task's current state.
    pub fn generate(&self, detail: &TaskDetail, task: &TaskState) -> Result<String> {
        let state = task.current_state;

        // The coding phase is step-scoped: prompts walk the archived
        // structured plan, then switch to the completion manifest.
        let mut plan: Option<ExecutionPlan> = None;
        let mut keys = template_keys(state);
        if state == WorkflowState::Coding(ReviewStep::Working) {
            let loaded = self.artifacts.read_archived_plan(&task.task_id)?;
            if task.current_step >= loaded.len() {
                keys = vec![CODING_MANIFEST_KEY.to_string()];
            }
            plan = Some(loaded);
        }
        let template = self.templates.resolve_keys(&keys, state);

        let context = if state.is_submittable() {
            self.context.resolve(&task.task_id, state)?
        } else {
            String::new()
        };

        let artifact = if state.is_review() {
            self.artifacts
                .read_live(&task.task_id)?
                .unwrap_or_else(|| "(no live artifact)".to_string())
        } else {
            String::new()
        };

        let feedback = match &task.revision_feedback {
            Some(f) => f.clone(),
            None => NO_FEEDBACK_PLACEHOLDER.to_string(),
        };

        let criteria = if detail.acceptance_criteria.is_empty() {
            "(none listed)".to_string()
        } else {
            detail
                .acceptance_criteria
                .iter()
                .map(|c| format!("- {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let (step_id, step_instruction, step_locations, step_dependencies) = match plan
            .as_ref()
            .and_then(|p| p.step_at(task.current_step))
        {
            Some(step) => (
                step.id.clone(),
                step.instruction.clone(),
                join_or_none(&step.affected_locations),
                join_or_none(&step.depends_on),
            ),
            None => Default::default(),
        };
        let steps_total = plan.as_ref().map(|p| p.len().to_string()).unwrap_or_default();
        let steps_done = plan
            .as_ref()
            .map(|_| task.current_step.to_string())
            .unwrap_or_default();

        let mut prompt = render(
            &template,
            &[
                ("task_id", &task.task_id),
                ("task_summary", &detail.summary),
                ("task_description", &detail.description),
                ("acceptance_criteria", &criteria),
                ("phase_title", state.phase().title()),
                ("context", &context),
                ("feedback", &feedback),
                ("artifact", &artifact),
                ("step_id", &step_id),
                ("step_instruction", &step_instruction),
                ("step_locations", &step_locations),
                ("step_dependencies", &step_dependencies),
                ("steps_total", &steps_total),
                ("steps_done", &steps_done),
            ],
        );

        if self.wants_fresh_session_notice(task) {
            prompt = format!("{}\n\n{}", FRESH_SESSION_NOTICE, prompt);
        }

        debug!(task_id = %task.task_id, state = %state, bytes = prompt.len(), "Generated prompt");
        Ok(prompt)
    }

    /// The engine marks the task when it enters a new phase and clears the
    /// marker once this notice has been emitted, so re-entry via revision or
    /// a later resume never repeats it.
    fn wants_fresh_session_notice(&self, task: &TaskState) -> bool {
        task.fresh_session_pending && task.current_state != WorkflowState::Done
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use stageflow_core::{ExecutionStep, Phase, TaskStatus};
    use tempfile::TempDir;

    fn detail() -> TaskDetail {
        TaskDetail {
            id: "TASK-1".to_string(),
            summary: "Add rate limiting".to_string(),
            description: "Requests must be throttled per client".to_string(),
            acceptance_criteria: vec!["429 after the limit".to_string()],
            status: TaskStatus::InProgress,
        }
    }

    fn setup(temp: &TempDir) -> (PromptGenerator, ArtifactStore) {
        let config = EngineConfig::new(temp.path());
        let artifacts = ArtifactStore::new(&config);
        (PromptGenerator::new(&config, artifacts.clone()), artifacts)
    }

    fn plan() -> ExecutionPlan {
        ExecutionPlan {
            steps: vec![
                ExecutionStep {
                    id: "STEP-001".to_string(),
                    instruction: "add the limiter module".to_string(),
                    affected_locations: vec!["src/limiter.rs".to_string()],
                    depends_on: vec![],
                },
                ExecutionStep {
                    id: "STEP-002".to_string(),
                    instruction: "enforce in the handler".to_string(),
                    affected_locations: vec!["src/handler.rs".to_string()],
                    depends_on: vec!["STEP-001".to_string()],
                },
            ],
        }
    }

    #[test]
    fn test_initial_prompt_has_notice_and_placeholder_feedback() {
        let temp = TempDir::new().unwrap();
        let (prompts, _) = setup(&temp);
        let task = TaskState::new("TASK-1");

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.starts_with(FRESH_SESSION_NOTICE));
        assert!(prompt.contains("Add rate limiting"));
        assert!(prompt.contains(NO_FEEDBACK_PLACEHOLDER));
        assert!(prompt.contains("429 after the limit"));
    }

    #[test]
    fn test_feedback_substituted_and_notice_suppressed() {
        let temp = TempDir::new().unwrap();
        let (prompts, _) = setup(&temp);
        let mut task = TaskState::new("TASK-1");
        task.fresh_session_pending = false;
        task.revision_feedback = Some("missing the burst case".to_string());

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("missing the burst case"));
        assert!(!prompt.contains(NO_FEEDBACK_PLACEHOLDER));
        assert!(!prompt.starts_with(FRESH_SESSION_NOTICE));
    }

    #[test]
    fn test_notice_follows_marker_not_state_shape() {
        let temp = TempDir::new().unwrap();
        let (prompts, _) = setup(&temp);

        // A feedbackless revision lands back on the phase-initial working
        // state with the marker already consumed: no second notice.
        let mut task = TaskState::new("TASK-1");
        task.current_state = "gitsetup_working".parse().unwrap();
        task.fresh_session_pending = false;
        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(!prompt.starts_with(FRESH_SESSION_NOTICE));

        task.fresh_session_pending = true;
        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.starts_with(FRESH_SESSION_NOTICE));
    }

    #[test]
    fn test_review_prompt_embeds_live_artifact() {
        let temp = TempDir::new().unwrap();
        let (prompts, artifacts) = setup(&temp);
        artifacts.write_live("TASK-1", "the submitted document").unwrap();

        let mut task = TaskState::new("TASK-1");
        task.current_state = "coding_devreview".parse().unwrap();
        task.fresh_session_pending = false;

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("the submitted document"));
        assert!(!prompt.starts_with(FRESH_SESSION_NOTICE));
    }

    #[test]
    fn test_coding_prompt_targets_current_step() {
        let temp = TempDir::new().unwrap();
        let (prompts, artifacts) = setup(&temp);
        artifacts.write_live("TASK-1", "plan text").unwrap();
        artifacts
            .archive("TASK-1", Phase::Planning, Some(&plan()))
            .unwrap();

        let mut task = TaskState::new("TASK-1");
        task.current_state = "coding_working".parse().unwrap();

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("STEP-001"));
        assert!(prompt.contains("add the limiter module"));

        task.current_step = 1;
        task.completed_steps = vec!["STEP-001".to_string()];
        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("STEP-002"));
        assert!(prompt.contains("enforce in the handler"));
    }

    #[test]
    fn test_all_steps_complete_yields_manifest_prompt() {
        let temp = TempDir::new().unwrap();
        let (prompts, artifacts) = setup(&temp);
        artifacts.write_live("TASK-1", "plan text").unwrap();
        artifacts
            .archive("TASK-1", Phase::Planning, Some(&plan()))
            .unwrap();

        let mut task = TaskState::new("TASK-1");
        task.current_state = "coding_working".parse().unwrap();
        task.current_step = 2;
        task.completed_steps = vec!["STEP-001".to_string(), "STEP-002".to_string()];

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("Completion Manifest"));
        assert!(!prompt.contains("STEP-001\n"));
    }

    #[test]
    fn test_missing_archive_rendered_inline() {
        let temp = TempDir::new().unwrap();
        let (prompts, _) = setup(&temp);
        let mut task = TaskState::new("TASK-1");
        task.current_state = "testing_working".parse().unwrap();

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("missing context"));
    }

    #[test]
    fn test_done_prompt() {
        let temp = TempDir::new().unwrap();
        let (prompts, _) = setup(&temp);
        let mut task = TaskState::new("TASK-1");
        task.current_state = WorkflowState::Done;

        let prompt = prompts.generate(&detail(), &task).unwrap();
        assert!(prompt.contains("Task Complete"));
    }
}
