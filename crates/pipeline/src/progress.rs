//! Progress reporting from the executors to whoever runs them.

use async_trait::async_trait;
use serde::Serialize;

/// Publishing a progress update failed for good.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Progress publication failed: {0}")]
pub struct ProgressError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Dump,
    Restore,
}

/// One table finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub table: String,
    pub completed: usize,
    pub total: usize,
}

impl ProgressUpdate {
    /// Completion in whole percent, `0..=100`.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// An error aborts the running operation.
    async fn report(&self, update: ProgressUpdate) -> Result<(), ProgressError>;
}

/// Discards updates.
#[derive(Debug, Default)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _update: ProgressUpdate) -> Result<(), ProgressError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(completed: usize, total: usize) -> ProgressUpdate {
        ProgressUpdate {
            phase: Phase::Dump,
            table: "t".into(),
            completed,
            total,
        }
    }

    #[test]
    fn percent_is_bounded() {
        assert_eq!(update(0, 4).percent(), 0);
        assert_eq!(update(1, 3).percent(), 33);
        assert_eq!(update(4, 4).percent(), 100);
        assert_eq!(update(9, 4).percent(), 100);
        assert_eq!(update(0, 0).percent(), 100);
    }
}
