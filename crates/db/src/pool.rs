//! Postgres connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::{DbError, RepositoryConfig};

/// Type alias for the shared Postgres pool used by the SQL repositories.
pub type DbPool = PgPool;

/// Create a new connection pool from the given `database_url`.
///
/// `max_connections` controls the pool ceiling.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!("Connecting to database (max_connections={})", max_connections);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Connect only when the configuration puts at least one repository in SQL
/// mode.
///
/// # Errors
/// [`DbError::Config`] when SQL mode is selected without `DATABASE_URL`.
pub async fn connect_if_needed(config: &RepositoryConfig) -> Result<Option<DbPool>, DbError> {
    if !config.needs_database() {
        return Ok(None);
    }

    let url = config.database_url.as_deref().ok_or_else(|| {
        DbError::Config("DATABASE_URL must be set when a repository uses sql mode".into())
    })?;
    create_pool(url, config.max_connections).await.map(Some)
}

/// Run embedded SQLx migrations located in `./migrations` (relative to the
/// workspace root at build time).
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("Running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
