//! In-memory workflow node execution repository.
//!
//! Node executions live in a primary map keyed on `node_execution_id`.  A
//! secondary index maps each `workflow_execution_id` to the ids of its node
//! executions in first-save order; it is maintained on every save so that a
//! run can be listed without scanning the primary map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use engine::{
    CallerIdentity, OrderConfig, RepositoryError, RepositoryScope, WorkflowNodeExecution,
    WorkflowNodeExecutionRepository, WorkflowNodeExecutionTriggeredFrom,
};

use crate::observer::{RecordKind, RepositoryObserver, TracingObserver};

/// Both structures sit behind one lock so a save is never half-applied.
#[derive(Debug, Default)]
struct NodeExecutionTables {
    executions: HashMap<String, WorkflowNodeExecution>,
    /// workflow_execution_id -> node_execution_ids
    workflow_run_index: HashMap<String, Vec<String>>,
}

impl NodeExecutionTables {
    fn index(&mut self, workflow_execution_id: &str, node_execution_id: &str) {
        let bucket = self
            .workflow_run_index
            .entry(workflow_execution_id.to_owned())
            .or_default();
        if !bucket.iter().any(|id| id == node_execution_id) {
            bucket.push(node_execution_id.to_owned());
        }
    }

    fn unindex(&mut self, workflow_execution_id: &str, node_execution_id: &str) {
        if let Some(bucket) = self.workflow_run_index.get_mut(workflow_execution_id) {
            bucket.retain(|id| id != node_execution_id);
            if bucket.is_empty() {
                self.workflow_run_index.remove(workflow_execution_id);
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Keeps node executions and their per-run index in memory.
///
/// `clear` empties the whole instance, not just the records of the
/// constructed tenant/app; the instance only ever holds one scope's data
/// anyway.
pub struct InMemoryWorkflowNodeExecutionRepository {
    scope: RepositoryScope<WorkflowNodeExecutionTriggeredFrom>,
    tables: RwLock<NodeExecutionTables>,
    observer: Arc<dyn RepositoryObserver>,
}

impl InMemoryWorkflowNodeExecutionRepository {
    /// Create an empty repository scoped to `user`.
    ///
    /// # Errors
    /// [`RepositoryError::InvalidContext`] if `user` has no tenant.
    pub fn new(
        user: &CallerIdentity,
        app_id: Option<String>,
        triggered_from: Option<WorkflowNodeExecutionTriggeredFrom>,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            scope: RepositoryScope::resolve(user, app_id, triggered_from)?,
            tables: RwLock::new(NodeExecutionTables::default()),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the default `tracing` diagnostics.
    pub fn with_observer(mut self, observer: Arc<dyn RepositoryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn scope(&self) -> &RepositoryScope<WorkflowNodeExecutionTriggeredFrom> {
        &self.scope
    }

    /// Number of stored node executions.
    pub fn len(&self) -> usize {
        self.tables.read().executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of workflow runs that currently have an index bucket.
    pub fn indexed_run_count(&self) -> usize {
        self.tables.read().workflow_run_index.len()
    }

    // Same seam as the execution repository: always passes in memory.
    fn matches_constraints(&self, _execution: &WorkflowNodeExecution) -> bool {
        true
    }

    fn collect_run(&self, workflow_execution_id: &str) -> Vec<WorkflowNodeExecution> {
        let tables = self.tables.read();
        let Some(bucket) = tables.workflow_run_index.get(workflow_execution_id) else {
            return Vec::new();
        };

        bucket
            .iter()
            .filter_map(|id| tables.executions.get(id))
            .filter(|execution| self.matches_constraints(execution))
            // Single-step executions and records moved to another run stay out.
            .filter(|execution| {
                execution.workflow_execution_id.as_deref() == Some(workflow_execution_id)
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WorkflowNodeExecutionRepository for InMemoryWorkflowNodeExecutionRepository {
    async fn save(&self, execution: &WorkflowNodeExecution) -> Result<(), RepositoryError> {
        let node_execution_id = execution.node_execution_id.as_str();
        if node_execution_id.is_empty() {
            self.observer.missing_identity(RecordKind::WorkflowNodeExecution);
            return Ok(());
        }

        {
            let mut guard = self.tables.write();
            let tables = &mut *guard;

            let previous = tables
                .executions
                .insert(node_execution_id.to_owned(), execution.clone());

            let current_run = non_empty(execution.workflow_execution_id.as_deref());
            let previous_run = previous
                .as_ref()
                .and_then(|p| non_empty(p.workflow_execution_id.as_deref()));

            if let Some(old_run) = previous_run.filter(|old| Some(*old) != current_run) {
                tables.unindex(old_run, node_execution_id);
            }
            if let Some(run) = current_run {
                tables.index(run, node_execution_id);
            }
        }

        self.observer
            .saved(RecordKind::WorkflowNodeExecution, node_execution_id);
        Ok(())
    }

    async fn get_by_node_execution_id(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<WorkflowNodeExecution>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .executions
            .get(node_execution_id)
            .filter(|execution| self.matches_constraints(execution))
            .cloned())
    }

    async fn get_by_workflow_run(
        &self,
        workflow_execution_id: &str,
        order_config: Option<&OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError> {
        let mut result = self.collect_run(workflow_execution_id);

        if let Some(order_config) = order_config.filter(|config| !config.is_empty()) {
            order_config.sort(&mut result);
        }

        Ok(result)
    }

    async fn get_running_executions(
        &self,
        workflow_execution_id: &str,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError> {
        Ok(self
            .collect_run(workflow_execution_id)
            .into_iter()
            .filter(WorkflowNodeExecution::is_running)
            .collect())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        let count = {
            let mut tables = self.tables.write();
            let count = tables.executions.len();
            tables.executions.clear();
            tables.workflow_run_index.clear();
            count
        };

        self.observer.cleared(
            RecordKind::WorkflowNodeExecution,
            count,
            &self.scope.describe(),
        );
        Ok(())
    }
}
