//! Workflow state machine.
//!
//! The transition table is an exhaustive match over the tagged state and
//! trigger enums, checked at compile time. Firing is pure: an invalid
//! trigger returns `InvalidTransition` and touches nothing, which is the
//! machine's core safety contract.

use stageflow_core::{
    GatherStep, PlanningStage, PlanningStep, ReviewStep, Trigger, WorkflowState,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Static phase/sub-state transition table. Constructed once and passed
/// explicitly; holds no state of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMachine;

impl StateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Compute the destination of firing `trigger` from `state`.
    pub fn fire(&self, state: WorkflowState, trigger: Trigger) -> Result<WorkflowState> {
        self.destination(state, trigger)
            .ok_or_else(|| EngineError::invalid_transition(state, trigger))
    }

    /// All triggers with a destination from `state`.
    pub fn valid_triggers(&self, state: WorkflowState) -> Vec<Trigger> {
        Trigger::ALL
            .into_iter()
            .filter(|t| self.destination(state, *t).is_some())
            .collect()
    }

    /// The advance trigger the engine should fire from a verified state.
    ///
    /// This is the single branch point where the scaffolding feature flag is
    /// consulted; the conditional is kept out of the static table.
    pub fn advance_trigger(&self, state: WorkflowState, config: &EngineConfig) -> Option<Trigger> {
        match state {
            WorkflowState::Planning(PlanningStep::Verified) => {
                if config.scaffolding_enabled {
                    Some(Trigger::AdvanceToScaffold)
                } else {
                    Some(Trigger::AdvanceToCode)
                }
            }
            s if s.is_verified() => Some(Trigger::Advance),
            _ => None,
        }
    }

    fn destination(&self, state: WorkflowState, trigger: Trigger) -> Option<WorkflowState> {
        use Trigger::*;
        use WorkflowState::*;

        match (state, trigger) {
            // Gather-requirements: abbreviated lifecycle, no review steps.
            (GatherRequirements(GatherStep::Working), SubmitForAiReview) => {
                Some(GatherRequirements(GatherStep::Verified))
            }
            (GatherRequirements(GatherStep::Verified), Advance) => {
                Some(GitSetup(ReviewStep::Working))
            }
            (GatherRequirements(_), _) => None,

            // Simple review phases. The testing phase's revision destination
            // is coding_working: failing tests force a return to
            // implementation, not to test-writing.
            (GitSetup(step), t) => match (step, t) {
                (ReviewStep::Verified, Advance) => {
                    Some(Planning(PlanningStep::Stage(PlanningStage::Strategy)))
                }
                _ => Self::review_step(step, t, GitSetup, GitSetup(ReviewStep::Working)),
            },
            (Scaffolding(step), t) => match (step, t) {
                (ReviewStep::Verified, Advance) => Some(Coding(ReviewStep::Working)),
                _ => Self::review_step(step, t, Scaffolding, Scaffolding(ReviewStep::Working)),
            },
            (Coding(step), t) => match (step, t) {
                (ReviewStep::Verified, Advance) => Some(Testing(ReviewStep::Working)),
                _ => Self::review_step(step, t, Coding, Coding(ReviewStep::Working)),
            },
            (Testing(step), t) => match (step, t) {
                (ReviewStep::Verified, Advance) => Some(Finalize(ReviewStep::Working)),
                _ => Self::review_step(step, t, Testing, Coding(ReviewStep::Working)),
            },
            (Finalize(step), t) => match (step, t) {
                (ReviewStep::Verified, Advance) => Some(Done),
                _ => Self::review_step(step, t, Finalize, Finalize(ReviewStep::Working)),
            },

            // Planning: ordered stages, each with its own dev review.
            // Revision always returns to the same stage, never an earlier one.
            (Planning(PlanningStep::Stage(stage)), SubmitForAiReview) => {
                Some(Planning(PlanningStep::StageReview(stage)))
            }
            (Planning(PlanningStep::StageReview(stage)), HumanApproves) => Some(match stage.next()
            {
                Some(next) => Planning(PlanningStep::Stage(next)),
                None => Planning(PlanningStep::Verified),
            }),
            (Planning(PlanningStep::StageReview(stage)), RequestRevision) => {
                Some(Planning(PlanningStep::Stage(stage)))
            }
            (Planning(PlanningStep::Verified), AdvanceToScaffold) => {
                Some(Scaffolding(ReviewStep::Working))
            }
            (Planning(PlanningStep::Verified), AdvanceToCode) => Some(Coding(ReviewStep::Working)),
            (Planning(_), _) => None,

            // Terminal, absorbing.
            (Done, _) => None,
        }
    }

    /// Shared transitions of the simple review lifecycle
    /// (`working → aireview → devreview → verified`).
    fn review_step(
        step: ReviewStep,
        trigger: Trigger,
        wrap: fn(ReviewStep) -> WorkflowState,
        revision_target: WorkflowState,
    ) -> Option<WorkflowState> {
        match (step, trigger) {
            (ReviewStep::Working, Trigger::SubmitForAiReview) => Some(wrap(ReviewStep::AiReview)),
            (ReviewStep::AiReview, Trigger::AiApproves) => Some(wrap(ReviewStep::DevReview)),
            (ReviewStep::AiReview, Trigger::RequestRevision) => Some(revision_target),
            (ReviewStep::DevReview, Trigger::HumanApproves) => Some(wrap(ReviewStep::Verified)),
            (ReviewStep::DevReview, Trigger::RequestRevision) => Some(revision_target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire(from: &str, trigger: &str) -> Result<WorkflowState> {
        let machine = StateMachine::new();
        machine.fire(from.parse().unwrap(), trigger.parse().unwrap())
    }

    fn assert_fires(from: &str, trigger: &str, to: &str) {
        assert_eq!(fire(from, trigger).unwrap().to_string(), to);
    }

    #[test]
    fn test_gather_requirements_skips_review() {
        assert_fires(
            "gatherrequirements_working",
            "submit_for_ai_review",
            "gatherrequirements_verified",
        );
        assert!(fire("gatherrequirements_working", "ai_approves").is_err());
        assert!(fire("gatherrequirements_working", "human_approves").is_err());
    }

    #[test]
    fn test_simple_review_lifecycle() {
        assert_fires("gitsetup_working", "submit_for_ai_review", "gitsetup_aireview");
        assert_fires("gitsetup_aireview", "ai_approves", "gitsetup_devreview");
        assert_fires("gitsetup_devreview", "human_approves", "gitsetup_verified");
        assert_fires("gitsetup_aireview", "request_revision", "gitsetup_working");
        assert_fires("gitsetup_devreview", "request_revision", "gitsetup_working");
    }

    #[test]
    fn test_testing_revision_returns_to_coding() {
        assert_fires("testing_devreview", "request_revision", "coding_working");
        assert_fires("testing_aireview", "request_revision", "coding_working");
    }

    #[test]
    fn test_planning_stage_progression() {
        assert_fires(
            "planning_strategy",
            "submit_for_ai_review",
            "planning_strategydevreview",
        );
        assert_fires(
            "planning_strategydevreview",
            "human_approves",
            "planning_solutiondesign",
        );
        assert_fires(
            "planning_strategydevreview",
            "request_revision",
            "planning_strategy",
        );
        assert_fires(
            "planning_solutiondesigndevreview",
            "human_approves",
            "planning_executionplan",
        );
        assert_fires(
            "planning_executionplandevreview",
            "human_approves",
            "planning_verified",
        );
        assert_fires(
            "planning_executionplandevreview",
            "request_revision",
            "planning_executionplan",
        );
    }

    #[test]
    fn test_phase_advance_chain() {
        assert_fires("gatherrequirements_verified", "advance", "gitsetup_working");
        assert_fires("gitsetup_verified", "advance", "planning_strategy");
        assert_fires("planning_verified", "advance_to_scaffold", "scaffolding_working");
        assert_fires("planning_verified", "advance_to_code", "coding_working");
        assert_fires("scaffolding_verified", "advance", "coding_working");
        assert_fires("coding_verified", "advance", "testing_working");
        assert_fires("testing_verified", "advance", "finalize_working");
        assert_fires("finalize_verified", "advance", "done");
    }

    #[test]
    fn test_planning_verified_rejects_plain_advance() {
        assert!(fire("planning_verified", "advance").is_err());
    }

    #[test]
    fn test_done_is_absorbing() {
        let machine = StateMachine::new();
        assert!(machine.valid_triggers(WorkflowState::Done).is_empty());
        for trigger in Trigger::ALL {
            assert!(machine.fire(WorkflowState::Done, trigger).is_err());
        }
    }

    #[test]
    fn test_invalid_trigger_reports_invalid_transition() {
        let err = fire("coding_working", "human_approves").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_valid_triggers_match_fire() {
        let machine = StateMachine::new();
        for state in WorkflowState::all() {
            let valid = machine.valid_triggers(state);
            for trigger in Trigger::ALL {
                assert_eq!(
                    machine.fire(state, trigger).is_ok(),
                    valid.contains(&trigger),
                    "mismatch for ({}, {})",
                    state,
                    trigger
                );
            }
        }
    }

    #[test]
    fn test_every_non_terminal_state_has_an_exit() {
        let machine = StateMachine::new();
        for state in WorkflowState::all() {
            if state == WorkflowState::Done {
                continue;
            }
            assert!(
                !machine.valid_triggers(state).is_empty(),
                "state {} is a dead end",
                state
            );
        }
    }

    #[test]
    fn test_advance_trigger_respects_scaffolding_flag() {
        let machine = StateMachine::new();
        let verified: WorkflowState = "planning_verified".parse().unwrap();

        let mut config = EngineConfig::new("/tmp");
        config.scaffolding_enabled = false;
        assert_eq!(
            machine.advance_trigger(verified, &config),
            Some(Trigger::AdvanceToCode)
        );

        config.scaffolding_enabled = true;
        assert_eq!(
            machine.advance_trigger(verified, &config),
            Some(Trigger::AdvanceToScaffold)
        );

        let other: WorkflowState = "coding_verified".parse().unwrap();
        assert_eq!(machine.advance_trigger(other, &config), Some(Trigger::Advance));
        let working: WorkflowState = "coding_working".parse().unwrap();
        assert_eq!(machine.advance_trigger(working, &config), None);
    }
}
