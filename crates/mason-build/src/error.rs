/// Build engine error types
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("step '{step}' failed: {message}")]
    StepFailure { step: String, message: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("build failed: {0}")]
    BuildFailed(String),
}

impl BuildError {
    /// Create a step failure error
    pub fn step_failure(step: impl Into<String>, message: impl ToString) -> Self {
        Self::StepFailure {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }
}
