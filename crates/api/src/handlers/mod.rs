pub mod schedules;
pub mod tasks;
