//! Repository contracts for execution history.
//!
//! Every backend (in-memory, Postgres) implements these traits, and callers
//! only ever hold `Arc<dyn …>` so they cannot tell which backend they got.
//!
//! Saving a record whose identity is empty is not an error: the record is
//! dropped and the backend reports it through its diagnostics only.

use async_trait::async_trait;

use crate::{OrderConfig, RepositoryError, WorkflowExecution, WorkflowNodeExecution};

/// Storage for [`WorkflowExecution`] records, keyed on `id`.
#[async_trait]
pub trait WorkflowExecutionRepository: Send + Sync {
    /// Insert or overwrite the execution with the same `id`.
    async fn save(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError>;

    /// Fetch an execution visible to this repository's scope.
    async fn get(&self, execution_id: &str) -> Result<Option<WorkflowExecution>, RepositoryError>;
}

/// Storage for [`WorkflowNodeExecution`] records, keyed on
/// `node_execution_id` and indexed by `workflow_execution_id`.
#[async_trait]
pub trait WorkflowNodeExecutionRepository: Send + Sync {
    /// Insert or overwrite the node execution with the same
    /// `node_execution_id`.
    async fn save(&self, execution: &WorkflowNodeExecution) -> Result<(), RepositoryError>;

    async fn get_by_node_execution_id(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<WorkflowNodeExecution>, RepositoryError>;

    /// All node executions of one workflow run.
    ///
    /// Without an `order_config` the records come back in the order they
    /// were first saved.
    async fn get_by_workflow_run(
        &self,
        workflow_execution_id: &str,
        order_config: Option<&OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError>;

    /// The node executions of one run that are still `running`.
    async fn get_running_executions(
        &self,
        workflow_execution_id: &str,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError>;

    /// Remove every stored node execution.
    async fn clear(&self) -> Result<(), RepositoryError>;
}
