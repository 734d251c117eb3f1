//! Artifact store.
//!
//! Each task owns a single mutable live artifact (the in-progress document
//! for whichever sub-state is active) and one immutable archive slot per
//! phase, keyed by the phase's fixed ordinal. The planning phase archives a
//! structured twin alongside the text form; that twin is the only
//! authoritative input to the coding phase.
//!
//! Layout under `.stageflow/tasks/<task_id>/`:
//!
//! ```text
//! artifact.md                 # live artifact
//! plan.draft.json             # pending structured twin
//! archive/03-planning.md      # per-phase slot, text form
//! archive/03-planning.plan.json
//! ```

use std::fs;
use std::path::PathBuf;

use stageflow_core::{ExecutionPlan, Phase};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

const TASKS_DIR: &str = "tasks";
const ARCHIVE_DIR: &str = "archive";
const LIVE_FILE: &str = "artifact.md";
const PLAN_DRAFT_FILE: &str = "plan.draft.json";

/// Separator written between appended submissions.
pub const APPEND_SEPARATOR: &str = "\n\n---\n\n";

/// Manages live and archived artifacts on disk.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            base: config.stageflow_dir().join(TASKS_DIR),
        }
    }

    fn task_dir(&self, task_id: &str) -> PathBuf {
        self.base.join(task_id)
    }

    fn live_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(LIVE_FILE)
    }

    fn plan_draft_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(PLAN_DRAFT_FILE)
    }

    fn archive_dir(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(ARCHIVE_DIR)
    }

    fn archive_slot(&self, task_id: &str, phase: Phase) -> PathBuf {
        self.archive_dir(task_id)
            .join(format!("{:02}-{}.md", phase.ordinal(), phase.as_str()))
    }

    fn archive_plan_slot(&self, task_id: &str, phase: Phase) -> PathBuf {
        self.archive_dir(task_id)
            .join(format!("{:02}-{}.plan.json", phase.ordinal(), phase.as_str()))
    }

    fn ensure_task_dir(&self, task_id: &str) -> Result<()> {
        let dir = self.task_dir(task_id);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            debug!(task_id, path = %dir.display(), "Created task artifact directory");
        }
        Ok(())
    }

    /// Replace the live artifact.
    pub fn write_live(&self, task_id: &str, content: &str) -> Result<()> {
        self.ensure_task_dir(task_id)?;
        fs::write(self.live_path(task_id), content)?;
        debug!(task_id, bytes = content.len(), "Wrote live artifact");
        Ok(())
    }

    /// Concatenate onto the live artifact, separating from existing
    /// non-empty content.
    pub fn append_live(&self, task_id: &str, content: &str) -> Result<()> {
        let existing = self.read_live(task_id)?.unwrap_or_default();
        let combined = if existing.is_empty() {
            content.to_string()
        } else {
            format!("{}{}{}", existing, APPEND_SEPARATOR, content)
        };
        self.write_live(task_id, &combined)
    }

    /// Append a stage submission, or replace the stage's section in place
    /// when the live document already carries its heading. Resubmitting a
    /// rejected stage must not leave two copies of the same section behind.
    pub fn upsert_live_section(&self, task_id: &str, heading: &str, content: &str) -> Result<()> {
        let existing = self.read_live(task_id)?.unwrap_or_default();
        match replace_section(&existing, heading, content) {
            Some(updated) => self.write_live(task_id, &updated),
            None => self.append_live(task_id, content),
        }
    }

    pub fn read_live(&self, task_id: &str) -> Result<Option<String>> {
        let path = self.live_path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Reinitialize the live artifact with placeholder content for a phase
    /// the task is entering.
    pub fn init_live(&self, task_id: &str, phase: Phase) -> Result<()> {
        let placeholder = format!("# {}\n\n_No content submitted yet._\n", phase.title());
        self.write_live(task_id, &placeholder)
    }

    /// Stash the structured plan between its submission and the planning
    /// archive. Validated before it is written.
    pub fn write_plan_draft(&self, task_id: &str, plan: &ExecutionPlan) -> Result<()> {
        plan.validate()?;
        self.ensure_task_dir(task_id)?;
        let content = serde_json::to_string_pretty(plan)
            .map_err(|e| EngineError::Operation(format!("Failed to serialize plan: {}", e)))?;
        fs::write(self.plan_draft_path(task_id), content)?;
        debug!(task_id, steps = plan.len(), "Stashed execution plan draft");
        Ok(())
    }

    pub fn read_plan_draft(&self, task_id: &str) -> Result<ExecutionPlan> {
        let path = self.plan_draft_path(task_id);
        if !path.exists() {
            return Err(EngineError::artifact_not_found(task_id, "execution plan draft"));
        }
        Self::parse_plan(task_id, &fs::read_to_string(path)?)
    }

    /// Snapshot the live artifact (and optional structured twin) into the
    /// phase's single archive slot. Revisiting a phase overwrites the slot;
    /// no deeper history is retained.
    pub fn archive(
        &self,
        task_id: &str,
        phase: Phase,
        structured_twin: Option<&ExecutionPlan>,
    ) -> Result<()> {
        let live = self.read_live(task_id)?;
        if live.is_none() && structured_twin.is_none() {
            return Err(EngineError::artifact_not_found(
                task_id,
                format!("live artifact for phase '{}'", phase.as_str()),
            ));
        }

        let dir = self.archive_dir(task_id);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        if let Some(content) = live {
            fs::write(self.archive_slot(task_id, phase), content)?;
        }

        if let Some(plan) = structured_twin {
            // Never archive a twin downstream readers cannot trust.
            plan.validate()?;
            let content = serde_json::to_string_pretty(plan)
                .map_err(|e| EngineError::Operation(format!("Failed to serialize plan: {}", e)))?;
            fs::write(self.archive_plan_slot(task_id, phase), content)?;
        }

        info!(task_id, phase = phase.as_str(), "Archived phase artifact");
        Ok(())
    }

    /// Text form of an archived phase artifact.
    pub fn read_archived(&self, task_id: &str, phase: Phase) -> Result<String> {
        let path = self.archive_slot(task_id, phase);
        if !path.exists() {
            return Err(EngineError::artifact_not_found(
                task_id,
                format!("archived artifact for phase '{}'", phase.as_str()),
            ));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// The archived structured twin of the planning phase, re-validated on
    /// every load. Invalid structured content is a hard failure, never
    /// silently coerced.
    pub fn read_archived_plan(&self, task_id: &str) -> Result<ExecutionPlan> {
        let path = self.archive_plan_slot(task_id, Phase::Planning);
        if !path.exists() {
            return Err(EngineError::artifact_not_found(
                task_id,
                "archived execution plan",
            ));
        }
        Self::parse_plan(task_id, &fs::read_to_string(path)?)
    }

    fn parse_plan(task_id: &str, content: &str) -> Result<ExecutionPlan> {
        let plan: ExecutionPlan = serde_json::from_str(content).map_err(|e| {
            EngineError::InvalidArtifact(format!(
                "execution plan for task {} failed to parse: {}",
                task_id, e
            ))
        })?;
        plan.validate()?;
        Ok(plan)
    }
}

/// Replace the section starting at `heading` (through the line before the
/// next same-level heading, or end of document) with `content`. `None` if
/// the document has no such heading.
fn replace_section(doc: &str, heading: &str, content: &str) -> Option<String> {
    let lines: Vec<&str> = doc.lines().collect();
    let start = lines.iter().position(|l| l.trim_end() == heading)?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with("## "))
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());

    let mut rebuilt: Vec<&str> = Vec::with_capacity(lines.len());
    rebuilt.extend_from_slice(&lines[..start]);
    rebuilt.extend(content.lines());
    rebuilt.extend_from_slice(&lines[end..]);
    Some(rebuilt.join("\n"))
}
