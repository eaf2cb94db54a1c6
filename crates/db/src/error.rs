//! Typed error type for the db crate.

use engine::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped back onto the domain model.
    #[error("cannot decode column '{column}': {message}")]
    Decode {
        column: &'static str,
        message: String,
    },

    /// Invalid repository configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The SQL backend was selected but no connection pool was supplied.
    #[error("sql repository mode requires a database pool")]
    PoolRequired,

    /// The id is already taken by a record of another tenant or app.
    #[error("{table} record '{id}' belongs to another tenant or app")]
    ScopeConflict { table: &'static str, id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Repository(inner) => inner,
            other => RepositoryError::Storage(Box::new(other)),
        }
    }
}
