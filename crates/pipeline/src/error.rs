use tenvault_core::store::StoreError;
use tenvault_core::SchemaError;

use crate::format::FormatError;
use crate::progress::ProgressError;

/// Errors that abort a dump or restore.
///
/// Rows dropped for unresolved references are not errors; they are counted
/// in the [`crate::report::RestoreReport`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Dump container error: {0}")]
    Format(#[from] FormatError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("Cancelled")]
    Cancelled,
}

impl ExecutorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
