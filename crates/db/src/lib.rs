//! Tenant stores: PostgreSQL through sqlx, and an in-memory store for tests
//! and dry runs.

pub mod json;
pub mod memory;
pub mod pg;
pub mod sql;

use sqlx::postgres::PgPoolOptions;

pub use memory::MemoryTenantStore;
pub use pg::PgTenantStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
