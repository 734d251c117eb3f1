use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown workflow state: {0}")]
    UnknownState(String),

    #[error("Unknown trigger: {0}")]
    UnknownTrigger(String),

    #[error("Invalid execution plan: {0}")]
    InvalidPlan(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task source error: {0}")]
    Source(String),
}
