//! Engine facade tying the schema, tenant store, storage targets and task
//! scheduler together, plus the periodic [`ScheduleRunner`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use tenvault_cloud::{build_storage, StorageConfig, StorageTarget};
use tenvault_core::retry::RetryPolicy;
use tenvault_core::store::TenantStore;
use tenvault_core::task::{TaskKey, TaskKind};
use tenvault_core::types::TenantId;
use tenvault_core::SchemaRegistry;
use tenvault_events::EventBus;
use tenvault_pipeline::{DumpExecutor, DumpRequest, RestoreExecutor, RestoreRequest};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::TaskError;
use crate::jobs::{BackupJob, ReportJob, RestoreJob};
use crate::report::{HttpReportBuilder, ReportBuilder, ReportRequest, UnconfiguredReportBuilder};
use crate::schedule::{utc_offset, BackupSchedule, ScheduleBook};
use crate::scheduler::{TaskHandle, TaskScheduler};
use crate::status::{MemoryStatusStore, StatusPublisher, TaskSnapshot};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Parameters of a backup.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupParams {
    pub tenant: TenantId,
    pub user: Uuid,
    /// Requesting feature; defaults to `"backup"`.
    #[serde(default)]
    pub origin: Option<String>,
    /// Modules to dump; all registered modules when absent.
    #[serde(default)]
    pub modules: Option<Vec<String>>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    /// Copies kept after this backup; zero keeps everything.
    #[serde(default)]
    pub backups_stored: usize,
}

/// Parameters of a restore into `tenant`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreParams {
    /// Target tenant.
    pub tenant: TenantId,
    pub user: Uuid,
    #[serde(default)]
    pub origin: Option<String>,
    /// Storage key of the backup, e.g. `"1/backup_20250501T030000.zip"`.
    pub path: String,
    /// Modules to restore; everything in the backup when absent.
    #[serde(default)]
    pub modules: Option<Vec<String>>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(flatten)]
    pub request: ReportRequest,
}

fn offset(minutes: i32) -> Result<FixedOffset, TaskError> {
    utc_offset(minutes).map_err(TaskError::Invalid)
}

fn task_key(origin: Option<String>, kind: TaskKind, tenant: TenantId, user: Uuid) -> TaskKey {
    let origin = origin
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| kind.as_str().to_string());
    TaskKey::new(origin, tenant, user)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn TenantStore>,
    scheduler: TaskScheduler,
    reports: Arc<dyn ReportBuilder>,
    schedules: ScheduleBook,
    config: EngineConfig,
    storage_retry: RetryPolicy,
}

impl Engine {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn TenantStore>,
        bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        let publisher = StatusPublisher::new(
            Arc::new(MemoryStatusStore::new()),
            bus,
            RetryPolicy::default().with_max_attempts(config.progress_publish_retries),
        );
        let reports: Arc<dyn ReportBuilder> = match &config.report_service_url {
            Some(url) => Arc::new(HttpReportBuilder::new(url.clone())),
            None => Arc::new(UnconfiguredReportBuilder),
        };

        Self {
            registry,
            store,
            scheduler: TaskScheduler::new(config.worker_pool_size, publisher),
            reports,
            schedules: ScheduleBook::new(),
            config,
            storage_retry: RetryPolicy::default(),
        }
    }

    pub fn with_report_builder(mut self, builder: Arc<dyn ReportBuilder>) -> Self {
        self.reports = builder;
        self
    }

    pub fn with_storage_retry(mut self, policy: RetryPolicy) -> Self {
        self.storage_retry = policy;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn schedules(&self) -> &ScheduleBook {
        &self.schedules
    }

    /// Check the tenant store is reachable.
    pub async fn ping(&self) -> Result<(), TaskError> {
        self.store
            .ping()
            .await
            .map_err(|e| TaskError::Executor(e.into()))
    }

    async fn storage(&self, config: Option<&StorageConfig>) -> Result<Arc<dyn StorageTarget>, TaskError> {
        match config {
            Some(config) => Ok(build_storage(config).await?),
            None => Ok(build_storage(&StorageConfig::local(&self.config.backup_storage_path)).await?),
        }
    }

    fn check_modules(&self, modules: &[String]) -> Result<(), TaskError> {
        self.registry
            .processing_order(modules)
            .map(|_| ())
            .map_err(|e| TaskError::Invalid(e.to_string()))
    }

    pub async fn start_backup(&self, params: BackupParams) -> Result<TaskHandle, TaskError> {
        let modules = params
            .modules
            .unwrap_or_else(|| self.registry.modules().to_vec());
        self.check_modules(&modules)?;
        let offset = offset(params.utc_offset_minutes)?;
        let storage = self.storage(params.storage.as_ref()).await?;

        let key = task_key(params.origin, TaskKind::Backup, params.tenant, params.user);
        let job = BackupJob {
            dumper: DumpExecutor::new(Arc::clone(&self.registry), Arc::clone(&self.store)),
            storage,
            request: DumpRequest {
                tenant: params.tenant,
                offset,
                modules,
            },
            backups_stored: params.backups_stored,
            retry: self.storage_retry.clone(),
        };
        self.scheduler.enqueue(key, Box::new(job)).await
    }

    pub async fn start_restore(&self, params: RestoreParams) -> Result<TaskHandle, TaskError> {
        if let Some(modules) = &params.modules {
            self.check_modules(modules)?;
        }
        let target_offset = offset(params.utc_offset_minutes)?;
        let storage = self.storage(params.storage.as_ref()).await?;

        let key = task_key(params.origin, TaskKind::Restore, params.tenant, params.user);
        let job = RestoreJob {
            restorer: RestoreExecutor::new(Arc::clone(&self.registry), Arc::clone(&self.store)),
            storage,
            path: params.path,
            request: RestoreRequest {
                target_tenant: params.tenant,
                target_offset,
                modules: params.modules,
            },
            retry: self.storage_retry.clone(),
        };
        self.scheduler.enqueue(key, Box::new(job)).await
    }

    pub async fn start_report(&self, params: ReportParams) -> Result<TaskHandle, TaskError> {
        if params.request.template.trim().is_empty() {
            return Err(TaskError::Invalid("template must not be empty".into()));
        }
        let request = params.request;
        let key = task_key(params.origin, TaskKind::Report, request.tenant, request.user);
        let job = ReportJob {
            builder: Arc::clone(&self.reports),
            request,
            poll_interval: self.config.report_poll_interval,
            max_polls: self.config.report_max_polls,
            retry: self.storage_retry.clone(),
        };
        self.scheduler.enqueue(key, Box::new(job)).await
    }

    pub async fn status(&self, key: &TaskKey) -> Result<Option<TaskSnapshot>, TaskError> {
        self.scheduler.status(key).await
    }

    pub async fn terminate(&self, key: &TaskKey) -> bool {
        self.scheduler.terminate(key).await
    }

    /// Cancel running tasks and wait for them to record their outcome.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// ScheduleRunner
// ---------------------------------------------------------------------------

/// Enqueues backups whose schedule is due.
///
/// A single long-lived tokio task ticking every
/// [`EngineConfig::schedule_check_interval`].
pub struct ScheduleRunner {
    engine: Arc<Engine>,
    interval: Duration,
}

impl ScheduleRunner {
    pub fn new(engine: Arc<Engine>) -> Self {
        let interval = engine.config.schedule_check_interval;
        Self { engine, interval }
    }

    /// Run the loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Backup schedule runner started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Backup schedule runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_due(Utc::now()).await;
                }
            }
        }
    }

    /// One cycle: enqueue every schedule due at `now`.
    ///
    /// Returns the number of backups enqueued.
    pub async fn run_due(&self, now: chrono::DateTime<Utc>) -> usize {
        let mut started = 0;
        for schedule in self.engine.schedules.due(now).await {
            let tenant = schedule.tenant;
            match self.engine.start_backup(Self::params(schedule)).await {
                Ok(handle) => {
                    tracing::info!(
                        tenant_id = tenant,
                        task_id = %handle.id,
                        created = handle.created,
                        "Scheduled backup enqueued"
                    );
                    started += 1;
                }
                Err(e) => {
                    tracing::error!(tenant_id = tenant, error = %e, "Scheduled backup failed to start");
                }
            }
            // A failed start waits for the next period instead of retrying
            // every tick.
            self.engine.schedules.mark_run(tenant, now).await;
        }
        started
    }

    fn params(schedule: BackupSchedule) -> BackupParams {
        BackupParams {
            tenant: schedule.tenant,
            user: schedule.user,
            origin: None,
            modules: None,
            utc_offset_minutes: schedule.utc_offset_minutes,
            storage: schedule.storage,
            backups_stored: schedule.backups_stored,
        }
    }
}
