use stageflow_core::CoreError;
use thiserror::Error;

/// Engine error taxonomy. Each operation fails with the variant naming its
/// actual cause; validation failures block the mutating call entirely, so an
/// error here means no partial transition was persisted.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Trigger '{trigger}' is not valid from state '{state}'")]
    InvalidTransition { state: String, trigger: String },

    #[error("Artifact not found for task {task_id}: {what}")]
    ArtifactNotFound { task_id: String, what: String },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Section '{heading}' not found in the live artifact")]
    SectionNotFound { heading: String },

    #[error("Step out of order: expected '{expected}', got '{got}'")]
    StepOutOfOrder { expected: String, got: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl EngineError {
    pub fn invalid_transition(
        state: impl std::fmt::Display,
        trigger: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            state: state.to_string(),
            trigger: trigger.to_string(),
        }
    }

    pub fn artifact_not_found(task_id: impl Into<String>, what: impl Into<String>) -> Self {
        Self::ArtifactNotFound {
            task_id: task_id.into(),
            what: what.into(),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TaskNotFound(id) => EngineError::TaskNotFound(id),
            CoreError::InvalidPlan(msg) => EngineError::InvalidArtifact(msg),
            other => EngineError::Operation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
