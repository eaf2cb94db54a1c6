//! `db` crate: storage backends for execution history.
//!
//! Provides the in-memory and Postgres implementations of the `engine`
//! repository traits, the configuration that chooses between them, and the
//! factories that hand callers a trait object. No business logic lives here.

pub mod config;
pub mod error;
pub mod factory;
pub mod models;
pub mod observer;
pub mod pool;
pub mod repository;

pub use config::{RepoMode, RepositoryConfig};
pub use error::DbError;
pub use factory::{create_workflow_execution_repository, create_workflow_node_execution_repository};
pub use observer::{RecordKind, RepositoryObserver, TracingObserver};
pub use pool::DbPool;
pub use repository::{
    InMemoryWorkflowExecutionRepository, InMemoryWorkflowNodeExecutionRepository,
    PostgresWorkflowExecutionRepository, PostgresWorkflowNodeExecutionRepository,
};
