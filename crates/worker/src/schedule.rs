//! Periodic backup schedules.
//!
//! A tenant has at most one [`BackupSchedule`]. The [`ScheduleBook`] holds
//! them together with the last time each one fired; the
//! [`ScheduleRunner`](crate::engine::ScheduleRunner) polls the book for due
//! entries.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tenvault_cloud::StorageConfig;
use tenvault_core::types::{TenantId, Timestamp};
use tokio::sync::RwLock;
use uuid::Uuid;

/// How often a backup runs. Hours are in the tenant's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum BackupPeriod {
    Daily { hour: u32 },
    Weekly { weekday: Weekday, hour: u32 },
    /// Days past the end of a month run on its last day.
    Monthly { day: u32, hour: u32 },
}

impl BackupPeriod {
    fn hour(self) -> u32 {
        match self {
            Self::Daily { hour } | Self::Weekly { hour, .. } | Self::Monthly { hour, .. } => hour,
        }
    }

    fn matches(self, date: NaiveDate) -> bool {
        match self {
            Self::Daily { .. } => true,
            Self::Weekly { weekday, .. } => date.weekday() == weekday,
            Self::Monthly { day, .. } => date.day() == day.min(days_in_month(date)),
        }
    }

    pub fn validate(self) -> Result<(), String> {
        if self.hour() > 23 {
            return Err(format!("hour must be 0-23, got {}", self.hour()));
        }
        if let Self::Monthly { day, .. } = self {
            if !(1..=31).contains(&day) {
                return Err(format!("day must be 1-31, got {day}"));
            }
        }
        Ok(())
    }
}

/// Offset east of UTC given in minutes; must be less than a day.
pub(crate) fn utc_offset(minutes: i32) -> Result<FixedOffset, String> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| format!("invalid UTC offset {minutes} minutes"))
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = (date.year(), date.month());
    let first_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSchedule {
    pub tenant: TenantId,
    /// User the scheduled backups run as.
    pub user: Uuid,
    pub period: BackupPeriod,
    /// Copies kept; older backups are deleted after each run.
    pub backups_stored: usize,
    /// Target for the backups; the engine default when absent.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl BackupSchedule {
    pub fn validate(&self) -> Result<(), String> {
        self.period.validate()?;
        if self.backups_stored == 0 {
            return Err("backups_stored must be at least 1".into());
        }
        self.offset()?;
        if let Some(storage) = &self.storage {
            storage.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn offset(&self) -> Result<FixedOffset, String> {
        utc_offset(self.utc_offset_minutes)
    }

    /// First run strictly after `after`.
    pub fn next_run_after(&self, after: Timestamp) -> Option<Timestamp> {
        let offset = self.offset().ok()?;
        let start = after.with_timezone(&offset).date_naive();
        let hour = self.period.hour();

        // Two months covers every monthly period.
        (0..63)
            .filter_map(|d| start.checked_add_signed(Duration::days(d)))
            .filter(|date| self.period.matches(*date))
            .filter_map(|date| date.and_hms_opt(hour, 0, 0))
            .filter_map(|local| offset.from_local_datetime(&local).single())
            .map(|at| at.with_timezone(&Utc))
            .find(|at| *at > after)
    }
}

// ---------------------------------------------------------------------------
// ScheduleBook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Entry {
    schedule: BackupSchedule,
    /// Last firing, or the time the schedule was set.
    last_run: DateTime<Utc>,
}

/// In-memory schedule registry keyed by tenant.
#[derive(Default)]
pub struct ScheduleBook {
    entries: RwLock<HashMap<TenantId, Entry>>,
}

impl ScheduleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, tenant: TenantId) -> Option<BackupSchedule> {
        self.entries
            .read()
            .await
            .get(&tenant)
            .map(|e| e.schedule.clone())
    }

    /// Create or replace the tenant's schedule. A replaced schedule starts
    /// counting from `now`.
    pub async fn put(&self, schedule: BackupSchedule, now: Timestamp) -> Result<(), String> {
        schedule.validate()?;
        tracing::info!(tenant_id = schedule.tenant, period = ?schedule.period, "Backup schedule set");
        self.entries.write().await.insert(
            schedule.tenant,
            Entry {
                schedule,
                last_run: now,
            },
        );
        Ok(())
    }

    pub async fn remove(&self, tenant: TenantId) -> bool {
        self.entries.write().await.remove(&tenant).is_some()
    }

    /// Schedules whose next run is at or before `now`.
    pub async fn due(&self, now: Timestamp) -> Vec<BackupSchedule> {
        let mut due: Vec<BackupSchedule> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| {
                e.schedule
                    .next_run_after(e.last_run)
                    .is_some_and(|next| next <= now)
            })
            .map(|e| e.schedule.clone())
            .collect();
        due.sort_by_key(|s| s.tenant);
        due
    }

    pub async fn mark_run(&self, tenant: TenantId, at: Timestamp) {
        if let Some(entry) = self.entries.write().await.get_mut(&tenant) {
            entry.last_run = at;
        }
    }

    pub async fn last_run(&self, tenant: TenantId) -> Option<Timestamp> {
        self.entries.read().await.get(&tenant).map(|e| e.last_run)
    }
}
