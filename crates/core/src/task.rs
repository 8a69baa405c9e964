//! Background task identity and lifecycle.
//!
//! Lives in `core` so the worker, the event bus and the API share one
//! definition of task keys and the status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TenantId;

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Backup,
    Restore,
    Report,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most one non-terminal task exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    /// Requesting feature, e.g. `"backup"` or `"crm-report"`.
    pub origin: String,
    pub tenant: TenantId,
    pub user: Uuid,
}

impl TaskKey {
    pub fn new(origin: impl Into<String>, tenant: TenantId, user: Uuid) -> Self {
        Self {
            origin: origin.into(),
            tenant,
            user,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.origin, self.tenant, self.user)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Started,
    Done,
    Failed,
}

impl TaskStatus {
    /// Statuses reachable from `self`. Terminal statuses have none; a
    /// finished task is never restarted.
    pub fn valid_transitions(self) -> &'static [TaskStatus] {
        match self {
            Self::Queued => &[Self::Started, Self::Failed],
            Self::Started => &[Self::Done, Self::Failed],
            Self::Done | Self::Failed => &[],
        }
    }

    pub fn can_transition(self, to: TaskStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn validate_transition(self, to: TaskStatus) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!("Invalid transition: {self:?} -> {to:?}"))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
