//! Tenvault background tasks.
//!
//! - [`scheduler::TaskScheduler`] runs [`scheduler::Job`]s on a bounded pool
//!   with at most one active task per key.
//! - [`jobs`] holds the backup, restore and report jobs.
//! - [`engine::Engine`] is the entry point used by the API: it builds jobs
//!   from request parameters and answers status queries.
//! - [`engine::ScheduleRunner`] fires periodic backups.

pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod report;
pub mod retention;
pub mod schedule;
pub mod scheduler;
pub mod status;

pub use config::EngineConfig;
pub use engine::{BackupParams, Engine, ReportParams, RestoreParams, ScheduleRunner};
pub use error::TaskError;
pub use schedule::{BackupPeriod, BackupSchedule};
pub use scheduler::TaskHandle;
pub use status::TaskSnapshot;
