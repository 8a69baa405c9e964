//! Tenant dump and restore executors.
//!
//! - [`dump::DumpExecutor`] reads a tenant's tables into a
//!   [`format::DumpContainer`].
//! - [`restore::RestoreExecutor`] writes a container into a target tenant,
//!   regenerating keys and remapping references.
//! - [`format`] encodes containers as zip archives.

pub mod dump;
pub mod error;
pub mod format;
pub mod order;
pub mod progress;
pub mod report;
pub mod restore;
pub mod timezone;

pub use dump::{DumpExecutor, DumpRequest};
pub use error::ExecutorError;
pub use format::{read_container, write_container, DumpContainer};
pub use progress::{NoProgress, ProgressSink, ProgressUpdate};
pub use report::RestoreReport;
pub use restore::{RestoreExecutor, RestoreRequest};
