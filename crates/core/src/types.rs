/// Auto-increment primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Tenant identifiers are PostgreSQL INTEGER.
pub type TenantId = i32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Tenant id stamped on rows shared by every tenant of the portal.
///
/// Such rows are never restored into a real tenant.
pub const GLOBAL_TENANT: TenantId = -1;
