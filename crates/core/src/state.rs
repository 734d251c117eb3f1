//! Workflow state vocabulary.
//!
//! A task's position in the lifecycle is a composite of a top-level phase and
//! a sub-state within that phase. The wire format is `"<phase>_<substate>"`
//! (e.g. `planning_solutiondesign`, `coding_working`) with the terminal state
//! serialized as plain `done`. The composite string is the sole source of
//! truth for workflow position, so parsing and formatting must round-trip
//! over the whole state space.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Top-level phase of the task lifecycle, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    GatherRequirements,
    GitSetup,
    Planning,
    Scaffolding,
    Coding,
    Testing,
    Finalize,
    Done,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::GatherRequirements,
        Phase::GitSetup,
        Phase::Planning,
        Phase::Scaffolding,
        Phase::Coding,
        Phase::Testing,
        Phase::Finalize,
        Phase::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::GatherRequirements => "gatherrequirements",
            Phase::GitSetup => "gitsetup",
            Phase::Planning => "planning",
            Phase::Scaffolding => "scaffolding",
            Phase::Coding => "coding",
            Phase::Testing => "testing",
            Phase::Finalize => "finalize",
            Phase::Done => "done",
        }
    }

    /// Human-readable phase name used in placeholders and generated documents.
    pub fn title(&self) -> &'static str {
        match self {
            Phase::GatherRequirements => "Requirement Gathering",
            Phase::GitSetup => "Git Setup",
            Phase::Planning => "Planning",
            Phase::Scaffolding => "Scaffolding",
            Phase::Coding => "Coding",
            Phase::Testing => "Testing",
            Phase::Finalize => "Finalization",
            Phase::Done => "Done",
        }
    }

    /// Fixed 1-based ordinal, used as the archive slot key.
    pub fn ordinal(&self) -> u8 {
        match self {
            Phase::GatherRequirements => 1,
            Phase::GitSetup => 2,
            Phase::Planning => 3,
            Phase::Scaffolding => 4,
            Phase::Coding => 5,
            Phase::Testing => 6,
            Phase::Finalize => 7,
            Phase::Done => 8,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Phase::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-state of the abbreviated gather-requirements lifecycle.
///
/// Requirement gathering skips both review steps: a submission moves the
/// phase straight to verified. This asymmetry is preserved from observed
/// behavior, not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatherStep {
    Working,
    Verified,
}

impl GatherStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatherStep::Working => "working",
            GatherStep::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "working" => Some(GatherStep::Working),
            "verified" => Some(GatherStep::Verified),
            _ => None,
        }
    }
}

/// Sub-state of the simple review lifecycle shared by most phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewStep {
    Working,
    AiReview,
    DevReview,
    Verified,
}

impl ReviewStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStep::Working => "working",
            ReviewStep::AiReview => "aireview",
            ReviewStep::DevReview => "devreview",
            ReviewStep::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "working" => Some(ReviewStep::Working),
            "aireview" => Some(ReviewStep::AiReview),
            "devreview" => Some(ReviewStep::DevReview),
            "verified" => Some(ReviewStep::Verified),
            _ => None,
        }
    }
}

/// Ordered stage of the multi-stage planning lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlanningStage {
    Strategy,
    SolutionDesign,
    ExecutionPlan,
}

impl PlanningStage {
    pub const ALL: [PlanningStage; 3] = [
        PlanningStage::Strategy,
        PlanningStage::SolutionDesign,
        PlanningStage::ExecutionPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningStage::Strategy => "strategy",
            PlanningStage::SolutionDesign => "solutiondesign",
            PlanningStage::ExecutionPlan => "executionplan",
        }
    }

    /// Heading marker that identifies this stage's section inside the live
    /// planning document.
    pub fn heading(&self) -> &'static str {
        match self {
            PlanningStage::Strategy => "## Strategy",
            PlanningStage::SolutionDesign => "## Solution Design",
            PlanningStage::ExecutionPlan => "## Execution Plan",
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<PlanningStage> {
        match self {
            PlanningStage::Strategy => Some(PlanningStage::SolutionDesign),
            PlanningStage::SolutionDesign => Some(PlanningStage::ExecutionPlan),
            PlanningStage::ExecutionPlan => None,
        }
    }

    pub fn is_first(&self) -> bool {
        *self == PlanningStage::Strategy
    }

    pub fn parse(s: &str) -> Option<Self> {
        PlanningStage::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

/// Position within the planning phase: a stage, its review, or verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanningStep {
    Stage(PlanningStage),
    StageReview(PlanningStage),
    Verified,
}

impl PlanningStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningStep::Stage(stage) => stage.as_str(),
            PlanningStep::StageReview(PlanningStage::Strategy) => "strategydevreview",
            PlanningStep::StageReview(PlanningStage::SolutionDesign) => "solutiondesigndevreview",
            PlanningStep::StageReview(PlanningStage::ExecutionPlan) => "executionplandevreview",
            PlanningStep::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s == "verified" {
            return Some(PlanningStep::Verified);
        }
        if let Some(stage) = PlanningStage::parse(s) {
            return Some(PlanningStep::Stage(stage));
        }
        let stage = s.strip_suffix("devreview").and_then(PlanningStage::parse)?;
        Some(PlanningStep::StageReview(stage))
    }
}

/// Composite workflow state: phase plus position inside that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    GatherRequirements(GatherStep),
    GitSetup(ReviewStep),
    Planning(PlanningStep),
    Scaffolding(ReviewStep),
    Coding(ReviewStep),
    Testing(ReviewStep),
    Finalize(ReviewStep),
    Done,
}

impl WorkflowState {
    pub fn phase(&self) -> Phase {
        match self {
            WorkflowState::GatherRequirements(_) => Phase::GatherRequirements,
            WorkflowState::GitSetup(_) => Phase::GitSetup,
            WorkflowState::Planning(_) => Phase::Planning,
            WorkflowState::Scaffolding(_) => Phase::Scaffolding,
            WorkflowState::Coding(_) => Phase::Coding,
            WorkflowState::Testing(_) => Phase::Testing,
            WorkflowState::Finalize(_) => Phase::Finalize,
            WorkflowState::Done => Phase::Done,
        }
    }

    pub fn substate_str(&self) -> &'static str {
        match self {
            WorkflowState::GatherRequirements(step) => step.as_str(),
            WorkflowState::GitSetup(step)
            | WorkflowState::Scaffolding(step)
            | WorkflowState::Coding(step)
            | WorkflowState::Testing(step)
            | WorkflowState::Finalize(step) => step.as_str(),
            WorkflowState::Planning(step) => step.as_str(),
            WorkflowState::Done => "",
        }
    }

    /// The state a task occupies when it first enters the given phase.
    pub fn initial_state(phase: Phase) -> WorkflowState {
        match phase {
            Phase::GatherRequirements => WorkflowState::GatherRequirements(GatherStep::Working),
            Phase::GitSetup => WorkflowState::GitSetup(ReviewStep::Working),
            Phase::Planning => WorkflowState::Planning(PlanningStep::Stage(PlanningStage::Strategy)),
            Phase::Scaffolding => WorkflowState::Scaffolding(ReviewStep::Working),
            Phase::Coding => WorkflowState::Coding(ReviewStep::Working),
            Phase::Testing => WorkflowState::Testing(ReviewStep::Working),
            Phase::Finalize => WorkflowState::Finalize(ReviewStep::Working),
            Phase::Done => WorkflowState::Done,
        }
    }

    pub fn is_phase_initial(&self) -> bool {
        *self == WorkflowState::initial_state(self.phase())
    }

    /// States that accept a work submission (working states and planning stages).
    pub fn is_submittable(&self) -> bool {
        match self {
            WorkflowState::GatherRequirements(GatherStep::Working) => true,
            WorkflowState::GitSetup(ReviewStep::Working)
            | WorkflowState::Scaffolding(ReviewStep::Working)
            | WorkflowState::Coding(ReviewStep::Working)
            | WorkflowState::Testing(ReviewStep::Working)
            | WorkflowState::Finalize(ReviewStep::Working) => true,
            WorkflowState::Planning(PlanningStep::Stage(_)) => true,
            _ => false,
        }
    }

    pub fn is_ai_review(&self) -> bool {
        matches!(
            self,
            WorkflowState::GitSetup(ReviewStep::AiReview)
                | WorkflowState::Scaffolding(ReviewStep::AiReview)
                | WorkflowState::Coding(ReviewStep::AiReview)
                | WorkflowState::Testing(ReviewStep::AiReview)
                | WorkflowState::Finalize(ReviewStep::AiReview)
        )
    }

    pub fn is_dev_review(&self) -> bool {
        matches!(
            self,
            WorkflowState::GitSetup(ReviewStep::DevReview)
                | WorkflowState::Scaffolding(ReviewStep::DevReview)
                | WorkflowState::Coding(ReviewStep::DevReview)
                | WorkflowState::Testing(ReviewStep::DevReview)
                | WorkflowState::Finalize(ReviewStep::DevReview)
                | WorkflowState::Planning(PlanningStep::StageReview(_))
        )
    }

    pub fn is_review(&self) -> bool {
        self.is_ai_review() || self.is_dev_review()
    }

    pub fn is_verified(&self) -> bool {
        matches!(
            self,
            WorkflowState::GatherRequirements(GatherStep::Verified)
                | WorkflowState::GitSetup(ReviewStep::Verified)
                | WorkflowState::Planning(PlanningStep::Verified)
                | WorkflowState::Scaffolding(ReviewStep::Verified)
                | WorkflowState::Coding(ReviewStep::Verified)
                | WorkflowState::Testing(ReviewStep::Verified)
                | WorkflowState::Finalize(ReviewStep::Verified)
        )
    }

    /// Every reachable state, in phase order. Used by table-completeness tests.
    pub fn all() -> Vec<WorkflowState> {
        let mut states = vec![
            WorkflowState::GatherRequirements(GatherStep::Working),
            WorkflowState::GatherRequirements(GatherStep::Verified),
        ];
        let review_steps = [
            ReviewStep::Working,
            ReviewStep::AiReview,
            ReviewStep::DevReview,
            ReviewStep::Verified,
        ];
        states.extend(review_steps.iter().map(|s| WorkflowState::GitSetup(*s)));
        for stage in PlanningStage::ALL {
            states.push(WorkflowState::Planning(PlanningStep::Stage(stage)));
            states.push(WorkflowState::Planning(PlanningStep::StageReview(stage)));
        }
        states.push(WorkflowState::Planning(PlanningStep::Verified));
        states.extend(review_steps.iter().map(|s| WorkflowState::Scaffolding(*s)));
        states.extend(review_steps.iter().map(|s| WorkflowState::Coding(*s)));
        states.extend(review_steps.iter().map(|s| WorkflowState::Testing(*s)));
        states.extend(review_steps.iter().map(|s| WorkflowState::Finalize(*s)));
        states.push(WorkflowState::Done);
        states
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == WorkflowState::Done {
            f.write_str("done")
        } else {
            write!(f, "{}_{}", self.phase().as_str(), self.substate_str())
        }
    }
}

impl FromStr for WorkflowState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "done" {
            return Ok(WorkflowState::Done);
        }
        let unknown = || CoreError::UnknownState(s.to_string());
        let (phase_str, sub) = s.split_once('_').ok_or_else(unknown)?;
        let phase = Phase::parse(phase_str).ok_or_else(unknown)?;
        match phase {
            Phase::GatherRequirements => GatherStep::parse(sub)
                .map(WorkflowState::GatherRequirements)
                .ok_or_else(unknown),
            Phase::GitSetup => ReviewStep::parse(sub)
                .map(WorkflowState::GitSetup)
                .ok_or_else(unknown),
            Phase::Planning => PlanningStep::parse(sub)
                .map(WorkflowState::Planning)
                .ok_or_else(unknown),
            Phase::Scaffolding => ReviewStep::parse(sub)
                .map(WorkflowState::Scaffolding)
                .ok_or_else(unknown),
            Phase::Coding => ReviewStep::parse(sub)
                .map(WorkflowState::Coding)
                .ok_or_else(unknown),
            Phase::Testing => ReviewStep::parse(sub)
                .map(WorkflowState::Testing)
                .ok_or_else(unknown),
            Phase::Finalize => ReviewStep::parse(sub)
                .map(WorkflowState::Finalize)
                .ok_or_else(unknown),
            Phase::Done => Err(unknown()),
        }
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkflowState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
