pub mod error;
pub mod plan;
pub mod state;
pub mod task;
pub mod trigger;

pub use error::CoreError;
pub use plan::{ExecutionPlan, ExecutionStep};
pub use state::{GatherStep, Phase, PlanningStage, PlanningStep, ReviewStep, WorkflowState};
pub use task::{TaskDetail, TaskSource, TaskState, TaskStatus, WorkSubmission};
pub use trigger::Trigger;
