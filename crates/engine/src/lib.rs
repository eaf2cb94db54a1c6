//! `engine` crate: domain models for workflow execution history and the
//! repository contracts that persist them.

#[macro_use]
mod macros;

pub mod models;
pub mod identity;
pub mod ordering;
pub mod repository;
pub mod error;

pub use models::{
    NodeExecutionMetadataKey, NodeExecutionStatus, NodeType, WorkflowExecution,
    WorkflowExecutionStatus, WorkflowNodeExecution, WorkflowType,
};
pub use identity::{
    CallerIdentity, CreatorUserRole, RepositoryScope, WorkflowNodeExecutionTriggeredFrom,
    WorkflowRunTriggeredFrom,
};
pub use ordering::{OrderConfig, OrderDirection, SortKey};
pub use repository::{WorkflowExecutionRepository, WorkflowNodeExecutionRepository};
pub use error::RepositoryError;
