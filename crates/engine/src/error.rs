//! Repository-level error types.

use thiserror::Error;

/// Errors surfaced through the repository traits.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The caller identity did not resolve to a usable scope.
    #[error("invalid repository context: {0}")]
    InvalidContext(String),

    /// The storage backend failed.  Never produced by the in-memory stores.
    #[error("storage backend error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}
