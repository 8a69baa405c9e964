//! Helper service shared by relation predicates and table hooks.
//!
//! Constructed once per registry and passed explicitly to every predicate
//! and hook, so each rule can be unit-tested with its own helper instance.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::types::Timestamp;
use crate::value::ColumnValue;

/// Portal core system account.
pub const CORE_SYSTEM_IDENTITY: &str = "a37ee56e-3302-4a7b-b67e-ddbea64cd032";

/// Built-in "everyone" group.
pub const EVERYONE_GROUP_IDENTITY: &str = "c5cc67d1-c3e8-43c0-a3ad-3928ae3e5b5e";

/// Built-in portal administrators group.
pub const ADMINS_GROUP_IDENTITY: &str = "cd84e66b-b803-40fc-99f9-b2969a54a1de";

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[derive(Clone)]
pub struct SchemaHelpers {
    sentinel_identities: HashSet<String>,
    clock: Arc<dyn Clock>,
}

impl SchemaHelpers {
    /// Helpers with the built-in sentinel identities and the wall clock.
    pub fn new() -> Self {
        let mut sentinel_identities: HashSet<String> = [
            CORE_SYSTEM_IDENTITY,
            EVERYONE_GROUP_IDENTITY,
            ADMINS_GROUP_IDENTITY,
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        sentinel_identities.insert(Uuid::nil().hyphenated().to_string());

        Self {
            sentinel_identities,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register an additional identity that is never looked up on restore.
    pub fn with_sentinel(mut self, identity: impl Into<ColumnValue>) -> Self {
        if let Some(key) = identity.into().key() {
            self.sentinel_identities.insert(key);
        }
        self
    }

    /// `true` for "system" or "empty" identities.
    ///
    /// These are not tenant-scoped entities, so identity columns holding them
    /// are copied unchanged instead of being remapped.
    pub fn is_sentinel_identity(&self, value: &ColumnValue) -> bool {
        if value.is_no_reference() {
            return true;
        }
        value
            .key()
            .is_some_and(|k| self.sentinel_identities.contains(&k))
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Current instant as a naive UTC date/time, the form dumped rows use.
    pub fn now_naive(&self) -> NaiveDateTime {
        self.clock.now().naive_utc()
    }
}

impl Default for SchemaHelpers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaHelpers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaHelpers")
            .field("sentinel_identities", &self.sentinel_identities.len())
            .finish_non_exhaustive()
    }
}
