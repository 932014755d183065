//! Stage error taxonomy for the document pipeline.
//!
//! Every stage fails with exactly one of these variants. The first error set on
//! a record is terminal: downstream stages pass the record through untouched.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "stage", content = "message", rename_all = "snake_case")]
pub enum StageError {
    /// Required input fields are missing, malformed, or unreadable.
    #[error("input failed: {0}")]
    Input(String),

    /// The model call failed after the bounded retry policy.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The self-review or structural check failed after every cycle.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The artifact could not be rendered or written.
    #[error("output failed: {0}")]
    Output(String),
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Input(_) => "input",
            StageError::Generation(_) => "generation",
            StageError::Validation(_) => "validation",
            StageError::Output(_) => "output",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StageError::Input(message)
            | StageError::Generation(message)
            | StageError::Validation(message)
            | StageError::Output(message) => message,
        }
    }
}
