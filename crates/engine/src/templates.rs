//! Prompt template resolution.
//!
//! Any (phase, stage) prompt resolves through an ordered chain, first match
//! wins: a user-supplied override file, the packaged default, and finally a
//! minimally synthesized fallback. Each resolver is pure and independently
//! testable.

use std::fs;
use std::path::{Path, PathBuf};

use stageflow_core::{PlanningStep, WorkflowState};
use tracing::debug;

use crate::config::EngineConfig;

/// Candidate template keys for a state, most specific first. Review states
/// fall back from their exact state key to the generic review template.
pub fn template_keys(state: WorkflowState) -> Vec<String> {
    let mut keys = vec![state.to_string()];
    if state.is_ai_review() {
        keys.push("aireview".to_string());
    } else if state.is_dev_review() {
        keys.push("devreview".to_string());
    }
    keys
}

/// Key used instead of `coding_working` once every plan step is complete.
pub const CODING_MANIFEST_KEY: &str = "coding_manifest";

/// Look up a user override template under the configured templates dir.
pub fn user_override(dir: &Path, key: &str) -> Option<String> {
    let path = dir.join(format!("{key}.md"));
    if !path.exists() {
        return None;
    }
    fs::read_to_string(&path).ok()
}

/// Look up the packaged default template for a key.
pub fn packaged_default(key: &str) -> Option<&'static str> {
    match key {
        "gatherrequirements_working" => {
            Some(include_str!("../templates/gatherrequirements_working.md"))
        }
        "gitsetup_working" => Some(include_str!("../templates/gitsetup_working.md")),
        "planning_strategy" => Some(include_str!("../templates/planning_strategy.md")),
        "planning_solutiondesign" => Some(include_str!("../templates/planning_solutiondesign.md")),
        "planning_executionplan" => Some(include_str!("../templates/planning_executionplan.md")),
        "scaffolding_working" => Some(include_str!("../templates/scaffolding_working.md")),
        "coding_working" => Some(include_str!("../templates/coding_working.md")),
        CODING_MANIFEST_KEY => Some(include_str!("../templates/coding_manifest.md")),
        "testing_working" => Some(include_str!("../templates/testing_working.md")),
        "finalize_working" => Some(include_str!("../templates/finalize_working.md")),
        "aireview" => Some(include_str!("../templates/aireview.md")),
        "devreview" => Some(include_str!("../templates/devreview.md")),
        "done" => Some(include_str!("../templates/done.md")),
        _ => None,
    }
}

/// Last-resort template synthesized from the state itself.
pub fn synthesized(state: WorkflowState) -> String {
    let phase = state.phase().title();
    match state {
        WorkflowState::Done => format!("The task is complete ({phase})."),
        s if s.is_verified() => format!(
            "The {phase} phase is verified for task {{{{task_id}}}}. Advance the workflow when ready."
        ),
        s if s.is_review() => format!(
            "Review the submitted {phase} artifact below. Approve it or request revision with feedback.\n\n{{{{artifact}}}}"
        ),
        WorkflowState::Planning(PlanningStep::Stage(stage)) => format!(
            "Produce the {} stage of the planning document for task {{{{task_id}}}}. Begin with the heading `{}`.\n\n{{{{context}}}}\n\n{{{{feedback}}}}",
            stage.as_str(),
            stage.heading()
        ),
        _ => format!(
            "Produce the {phase} artifact for task {{{{task_id}}}}.\n\n{{{{context}}}}\n\n{{{{feedback}}}}"
        ),
    }
}

/// Ordered template lookup for one workspace.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    override_dir: PathBuf,
}

impl TemplateResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            override_dir: config.templates_path(),
        }
    }

    /// Resolve a template by explicit key candidates, most specific first.
    pub fn resolve_keys(&self, keys: &[String], state: WorkflowState) -> String {
        for key in keys {
            if let Some(template) = user_override(&self.override_dir, key) {
                debug!(key, "Using user template override");
                return template;
            }
        }
        for key in keys {
            if let Some(template) = packaged_default(key) {
                return template.to_string();
            }
        }
        synthesized(state)
    }

    /// Resolve the template for a state.
    pub fn resolve(&self, state: WorkflowState) -> String {
        self.resolve_keys(&template_keys(state), state)
    }
}

/// Substitute `{{name}}` placeholders. Unknown placeholders are left in
/// place so gaps stay visible in the generated prompt.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}
