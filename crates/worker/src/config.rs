use std::time::Duration;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PostgreSQL connection string. Without it the engine runs against an
    /// in-memory tenant store.
    pub database_url: Option<String>,
    /// Maximum number of jobs running at once (default: `4`).
    pub worker_pool_size: usize,
    /// Base directory of the default `local` storage target.
    pub backup_storage_path: String,
    /// How often the schedule runner looks for due backups.
    pub schedule_check_interval: Duration,
    /// Attempts made to publish one progress update.
    pub progress_publish_retries: u32,
    /// Base URL of the document-build service used by report jobs.
    pub report_service_url: Option<String>,
    pub report_poll_interval: Duration,
    pub report_max_polls: u32,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default     |
    /// |-------------------------------|-------------|
    /// | `DATABASE_URL`                | unset       |
    /// | `WORKER_POOL_SIZE`            | `4`         |
    /// | `BACKUP_STORAGE_PATH`         | `./backups` |
    /// | `SCHEDULE_CHECK_INTERVAL_SECS`| `60`        |
    /// | `PROGRESS_PUBLISH_RETRIES`    | `3`         |
    /// | `REPORT_SERVICE_URL`          | unset       |
    /// | `REPORT_POLL_INTERVAL_MS`     | `1000`      |
    /// | `REPORT_MAX_POLLS`            | `600`       |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let worker_pool_size: usize = std::env::var("WORKER_POOL_SIZE")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("WORKER_POOL_SIZE must be a valid usize");

        let backup_storage_path =
            std::env::var("BACKUP_STORAGE_PATH").unwrap_or_else(|_| "./backups".into());

        let schedule_check_interval_secs: u64 = std::env::var("SCHEDULE_CHECK_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("SCHEDULE_CHECK_INTERVAL_SECS must be a valid u64");

        let progress_publish_retries: u32 = std::env::var("PROGRESS_PUBLISH_RETRIES")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("PROGRESS_PUBLISH_RETRIES must be a valid u32");

        let report_service_url = std::env::var("REPORT_SERVICE_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let report_poll_interval_ms: u64 = std::env::var("REPORT_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("REPORT_POLL_INTERVAL_MS must be a valid u64");

        let report_max_polls: u32 = std::env::var("REPORT_MAX_POLLS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REPORT_MAX_POLLS must be a valid u32");

        Self {
            database_url,
            worker_pool_size: worker_pool_size.max(1),
            backup_storage_path,
            schedule_check_interval: Duration::from_secs(schedule_check_interval_secs.max(1)),
            progress_publish_retries: progress_publish_retries.max(1),
            report_service_url,
            report_poll_interval: Duration::from_millis(report_poll_interval_ms),
            report_max_polls: report_max_polls.max(1),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            worker_pool_size: 4,
            backup_storage_path: "./backups".into(),
            schedule_check_interval: Duration::from_secs(60),
            progress_publish_retries: 3,
            report_service_url: None,
            report_poll_interval: Duration::from_secs(1),
            report_max_polls: 600,
        }
    }
}
