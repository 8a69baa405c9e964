//! The jobs run by the task scheduler.

pub mod backup;
pub mod report;
pub mod restore;

pub use backup::{backup_path, BackupJob};
pub use report::ReportJob;
pub use restore::RestoreJob;

use tenvault_cloud::StorageError;
use tenvault_core::retry::RetryError;

use crate::error::TaskError;

fn storage_failure(e: RetryError<StorageError>) -> TaskError {
    match e.into_inner() {
        Some(e) => TaskError::Storage(e),
        None => TaskError::Cancelled,
    }
}
