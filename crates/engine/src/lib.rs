//! Deterministic, recoverable workflow engine for development tasks.
//!
//! Drives one task at a time through a fixed lifecycle (requirements, git
//! setup, planning, optional scaffolding, coding, testing, finalization)
//! with a hierarchical state machine, dual-format artifact storage, and
//! context-aware prompt generation.

pub mod artifact_store;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod machine;
pub mod progress;
pub mod prompts;
pub mod state_store;
pub mod task_source;
pub mod templates;

pub use artifact_store::ArtifactStore;
pub use config::EngineConfig;
pub use context::ContextResolver;
pub use engine::{EngineResponse, TaskInspection, WorkflowEngine};
pub use error::{EngineError, Result};
pub use machine::StateMachine;
pub use progress::ProgressTracker;
pub use prompts::PromptGenerator;
pub use state_store::StateStore;
pub use task_source::LocalTaskSource;
