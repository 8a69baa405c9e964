//! Tenvault task event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TaskEvent`]: lifecycle and progress change of one background task.
//! - [`EventLog`]: background subscriber writing events to the log.

pub mod bus;
pub mod log;

pub use bus::{EventBus, TaskEvent};
pub use log::EventLog;
