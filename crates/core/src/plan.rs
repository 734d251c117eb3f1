//! Execution plan types.
//!
//! The execution plan is the structured twin of the planning phase's final
//! stage. It is generated once during planning, schema-validated before
//! anything downstream trusts it, and consumed read-only by the coding
//! phase, one step at a time.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Pattern every step identifier must match (e.g. `STEP-001`, `STEP-1042`).
const STEP_ID_PATTERN: &str = r"^STEP-\d{3,}$";

fn step_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(STEP_ID_PATTERN).expect("Invalid step id pattern"))
}

/// A single unit of work within the coding phase. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Identifier matching `STEP-<3+ digit number>`, distinct within a plan.
    pub id: String,
    /// What to do in this step.
    pub instruction: String,
    /// Files or modules this step touches.
    #[serde(default)]
    pub affected_locations: Vec<String>,
    /// Ids of steps that must be completed first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Ordered list of execution steps produced by the planning phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
}

impl ExecutionPlan {
    /// Validate the plan against its schema: non-empty, well-formed unique
    /// step ids, and dependencies that only reference earlier steps.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::InvalidPlan(
                "plan contains no steps".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if !step_id_regex().is_match(&step.id) {
                return Err(CoreError::InvalidPlan(format!(
                    "step id '{}' does not match STEP-<number> pattern",
                    step.id
                )));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(CoreError::InvalidPlan(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
            for dep in &step.depends_on {
                if dep == &step.id {
                    return Err(CoreError::InvalidPlan(format!(
                        "step '{}' depends on itself",
                        step.id
                    )));
                }
                if !seen.contains(dep.as_str()) {
                    return Err(CoreError::InvalidPlan(format!(
                        "step '{}' depends on '{}', which is not an earlier step",
                        step.id, dep
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step at the given zero-based position.
    pub fn step_at(&self, index: usize) -> Option<&ExecutionStep> {
        self.steps.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str]) -> ExecutionStep {
        ExecutionStep {
            id: id.to_string(),
            instruction: format!("do {}", id),
            affected_locations: vec!["src/lib.rs".to_string()],
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_plan() {
        let plan = ExecutionPlan {
            steps: vec![
                step("STEP-001", &[]),
                step("STEP-002", &["STEP-001"]),
                step("STEP-010", &["STEP-001", "STEP-002"]),
            ],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let plan = ExecutionPlan { steps: vec![] };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_bad_step_id_rejected() {
        for bad in ["STEP-01", "step-001", "STEP_001", "TASK-001", "STEP-001x"] {
            let plan = ExecutionPlan {
                steps: vec![step(bad, &[])],
            };
            assert!(plan.validate().is_err(), "expected rejection of '{}'", bad);
        }
    }

    #[test]
    fn test_duplicate_step_id_rejected() {
        let plan = ExecutionPlan {
            steps: vec![step("STEP-001", &[]), step("STEP-001", &[])],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let plan = ExecutionPlan {
            steps: vec![step("STEP-001", &["STEP-002"]), step("STEP-002", &[])],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_plan_round_trip() {
        let plan = ExecutionPlan {
            steps: vec![step("STEP-001", &[]), step("STEP-002", &["STEP-001"])],
        };
        let json = serde_json::to_string_pretty(&plan).unwrap();
        let back: ExecutionPlan = serde_json::from_str(&json).unwrap();
        assert!(back.validate().is_ok());
        assert_eq!(back, plan);
    }
}
