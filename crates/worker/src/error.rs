use tenvault_cloud::StorageError;
use tenvault_pipeline::format::FormatError;
use tenvault_pipeline::ExecutorError;

use crate::report::ReportError;

/// Why a background task failed.
///
/// The `Display` text becomes the task's failure reason.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// The status store rejected an update after all retries.
    #[error("Status publication failed: {0}")]
    Status(String),

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    Invalid(String),
}

impl TaskError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Executor(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
