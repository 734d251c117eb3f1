//! Context resolver.
//!
//! Declarative mapping from "this state needs artifact X from phase Y" to
//! actual content injection. Two source kinds exist: the archived text of an
//! already-completed phase, and a named section extracted from the live
//! planning document (a cross-stage dependency inside the multi-stage phase).
//!
//! A missing archive is rendered as visible error text inside the prompt so
//! a human can see and correct the gap; a missing section marker is a hard
//! error, because the stage that should have written it just ran.

use stageflow_core::{Phase, PlanningStage, PlanningStep, ReviewStep, WorkflowState};
use tracing::debug;

use crate::artifact_store::ArtifactStore;
use crate::error::{EngineError, Result};

/// One prior-artifact requirement of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRequest {
    /// Archived text of a completed phase.
    Archive(Phase),
    /// Named section of the in-progress planning document.
    LiveSection(PlanningStage),
}

/// The ordered prior-artifact requirements of a state. Enum-keyed; states
/// absent from this table need no injected context.
pub fn context_requests(state: WorkflowState) -> &'static [ContextRequest] {
    use ContextRequest::*;
    match state {
        WorkflowState::GitSetup(ReviewStep::Working) => &[Archive(Phase::GatherRequirements)],
        WorkflowState::Planning(PlanningStep::Stage(PlanningStage::Strategy)) => {
            &[Archive(Phase::GatherRequirements)]
        }
        WorkflowState::Planning(PlanningStep::Stage(PlanningStage::SolutionDesign)) => &[
            Archive(Phase::GatherRequirements),
            LiveSection(PlanningStage::Strategy),
        ],
        WorkflowState::Planning(PlanningStep::Stage(PlanningStage::ExecutionPlan)) => &[
            LiveSection(PlanningStage::Strategy),
            LiveSection(PlanningStage::SolutionDesign),
        ],
        WorkflowState::Scaffolding(ReviewStep::Working) => &[Archive(Phase::Planning)],
        WorkflowState::Coding(ReviewStep::Working) => &[Archive(Phase::Planning)],
        WorkflowState::Testing(ReviewStep::Working) => {
            &[Archive(Phase::GatherRequirements), Archive(Phase::Coding)]
        }
        WorkflowState::Finalize(ReviewStep::Working) => &[Archive(Phase::Testing)],
        _ => &[],
    }
}

/// Resolves the context requirements of a state into prompt-ready text.
#[derive(Debug, Clone)]
pub struct ContextResolver {
    artifacts: ArtifactStore,
}

impl ContextResolver {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self { artifacts }
    }

    /// Build the combined context block for a state, in table order.
    pub fn resolve(&self, task_id: &str, state: WorkflowState) -> Result<String> {
        let requests = context_requests(state);
        if requests.is_empty() {
            return Ok(String::new());
        }

        let mut blocks = Vec::with_capacity(requests.len());
        for request in requests {
            blocks.push(self.resolve_one(task_id, *request)?);
        }
        debug!(task_id, state = %state, blocks = blocks.len(), "Resolved prompt context");
        Ok(blocks.join("\n\n"))
    }

    fn resolve_one(&self, task_id: &str, request: ContextRequest) -> Result<String> {
        match request {
            ContextRequest::Archive(phase) => match self.artifacts.read_archived(task_id, phase) {
                Ok(content) => Ok(format!(
                    "### Context: {} output\n\n{}",
                    phase.title(),
                    content.trim_end()
                )),
                // Non-fatal: surface the gap inline instead of aborting the prompt.
                Err(EngineError::ArtifactNotFound { .. }) => Ok(format!(
                    "### Context: {} output\n\n[missing context: no archived artifact for phase '{}']",
                    phase.title(),
                    phase.as_str()
                )),
                Err(e) => Err(e),
            },
            ContextRequest::LiveSection(stage) => {
                let doc = self
                    .artifacts
                    .read_live(task_id)?
                    .ok_or(EngineError::SectionNotFound {
                        heading: stage.heading().to_string(),
                    })?;
                let section = extract_section(&doc, stage.heading()).ok_or(
                    EngineError::SectionNotFound {
                        heading: stage.heading().to_string(),
                    },
                )?;
                Ok(section)
            }
        }
    }
}

/// Extract a section from a markdown document: the heading line through the
/// line before the next same-level heading (or end of document).
fn extract_section(doc: &str, heading: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut inside = false;
    for line in doc.lines() {
        if inside {
            if line.starts_with("## ") {
                break;
            }
            lines.push(line);
        } else if line.trim_end() == heading {
            inside = true;
            lines.push(line);
        }
    }
    if !inside {
        return None;
    }
    Some(lines.join("\n").trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use tempfile::TempDir;

    fn resolver(temp: &TempDir) -> (ContextResolver, ArtifactStore) {
        let config = EngineConfig::new(temp.path());
        let artifacts = ArtifactStore::new(&config);
        (ContextResolver::new(artifacts.clone()), artifacts)
    }

    #[test]
    fn test_extract_section() {
        let doc = "intro\n\n## Strategy\nplan A\nplan B\n\n## Solution Design\ndesign text\n";
        let section = extract_section(doc, "## Strategy").unwrap();
        assert!(section.contains("plan A"));
        assert!(section.contains("plan B"));
        assert!(!section.contains("design text"));

        let tail = extract_section(doc, "## Solution Design").unwrap();
        assert!(tail.contains("design text"));

        assert!(extract_section(doc, "## Execution Plan").is_none());
    }

    #[test]
    fn test_archive_context_injected() {
        let temp = TempDir::new().unwrap();
        let (resolver, artifacts) = resolver(&temp);
        artifacts.write_live("TASK-1", "the requirements").unwrap();
        artifacts
            .archive("TASK-1", Phase::GatherRequirements, None)
            .unwrap();

        let state: WorkflowState = "gitsetup_working".parse().unwrap();
        let context = resolver.resolve("TASK-1", state).unwrap();
        assert!(context.contains("the requirements"));
    }

    #[test]
    fn test_missing_archive_is_inline_text() {
        let temp = TempDir::new().unwrap();
        let (resolver, _) = resolver(&temp);

        let state: WorkflowState = "gitsetup_working".parse().unwrap();
        let context = resolver.resolve("TASK-1", state).unwrap();
        assert!(context.contains("missing context"));
        assert!(context.contains("gatherrequirements"));
    }

    #[test]
    fn test_missing_section_is_hard_error() {
        let temp = TempDir::new().unwrap();
        let (resolver, artifacts) = resolver(&temp);
        artifacts.write_live("TASK-1", "no headings here").unwrap();
        artifacts
            .archive("TASK-1", Phase::GatherRequirements, None)
            .unwrap();

        let state: WorkflowState = "planning_solutiondesign".parse().unwrap();
        let err = resolver.resolve("TASK-1", state).unwrap_err();
        assert!(matches!(err, EngineError::SectionNotFound { .. }));
    }

    #[test]
    fn test_cross_stage_extraction() {
        let temp = TempDir::new().unwrap();
        let (resolver, artifacts) = resolver(&temp);
        artifacts
            .write_live("TASK-1", "## Strategy\nuse a queue\n")
            .unwrap();
        artifacts
            .append_live("TASK-1", "## Solution Design\ntwo workers\n")
            .unwrap();

        let state: WorkflowState = "planning_executionplan".parse().unwrap();
        let context = resolver.resolve("TASK-1", state).unwrap();
        assert!(context.contains("use a queue"));
        assert!(context.contains("two workers"));
    }

    #[test]
    fn test_states_without_context() {
        assert!(context_requests("gatherrequirements_working".parse().unwrap()).is_empty());
        assert!(context_requests("coding_aireview".parse().unwrap()).is_empty());
        assert!(context_requests(WorkflowState::Done).is_empty());
    }
}
