//! Postgres workflow node execution repository.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use engine::{
    CallerIdentity, NodeExecutionStatus, OrderConfig, RepositoryError, RepositoryScope,
    WorkflowNodeExecution, WorkflowNodeExecutionRepository, WorkflowNodeExecutionTriggeredFrom,
};

use super::{ensure_written, order_clause};
use crate::models::{encode_metadata, NodeExecutionRow};
use crate::observer::{RecordKind, RepositoryObserver, TracingObserver};
use crate::{DbError, DbPool};

const SELECT_COLUMNS: &str = r#"
    id, node_execution_id, workflow_id, workflow_execution_id, "index",
    predecessor_node_id, node_id, node_type, title, inputs, process_data,
    outputs, status, error, elapsed_time, execution_metadata, created_at,
    finished_at
"#;

/// Insert or update one node execution.  A conflicting row owned by another
/// tenant/app is left alone, so the statement affects no rows.
pub(crate) const UPSERT: &str = r#"
    INSERT INTO workflow_node_executions (
        node_execution_id, id, tenant_id, app_id, triggered_from,
        created_by_role, created_by, workflow_id, workflow_execution_id,
        "index", predecessor_node_id, node_id, node_type, title, inputs,
        process_data, outputs, status, error, elapsed_time,
        execution_metadata, created_at, finished_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
    ON CONFLICT (node_execution_id) DO UPDATE SET
        workflow_execution_id = EXCLUDED.workflow_execution_id,
        "index"               = EXCLUDED."index",
        predecessor_node_id   = EXCLUDED.predecessor_node_id,
        title                 = EXCLUDED.title,
        inputs                = EXCLUDED.inputs,
        process_data          = EXCLUDED.process_data,
        outputs               = EXCLUDED.outputs,
        status                = EXCLUDED.status,
        error                 = EXCLUDED.error,
        elapsed_time          = EXCLUDED.elapsed_time,
        execution_metadata    = EXCLUDED.execution_metadata,
        finished_at           = EXCLUDED.finished_at
    WHERE workflow_node_executions.tenant_id = EXCLUDED.tenant_id
      AND workflow_node_executions.app_id IS NOT DISTINCT FROM EXCLUDED.app_id
"#;

const SCOPE_FILTER: &str = "tenant_id = $1 AND ($2::text IS NULL OR app_id = $2)";

/// Node executions stored in the `workflow_node_executions` table.
///
/// The per-run listing is served by the `(tenant_id, app_id,
/// workflow_execution_id)` index rather than an in-process map.
pub struct PostgresWorkflowNodeExecutionRepository {
    pool: DbPool,
    scope: RepositoryScope<WorkflowNodeExecutionTriggeredFrom>,
    observer: Arc<dyn RepositoryObserver>,
}

impl PostgresWorkflowNodeExecutionRepository {
    /// # Errors
    /// [`RepositoryError::InvalidContext`] if `user` has no tenant.
    pub fn new(
        pool: DbPool,
        user: &CallerIdentity,
        app_id: Option<String>,
        triggered_from: Option<WorkflowNodeExecutionTriggeredFrom>,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            pool,
            scope: RepositoryScope::resolve(user, app_id, triggered_from)?,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RepositoryObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[instrument(skip(self, execution), fields(node_execution_id = %execution.node_execution_id))]
    async fn upsert(&self, execution: &WorkflowNodeExecution) -> Result<(), DbError> {
        let result = sqlx::query(UPSERT)
            .bind(&execution.node_execution_id)
            .bind(&execution.id)
            .bind(&self.scope.tenant_id)
            .bind(self.scope.app_id.as_deref())
            .bind(self.scope.triggered_from.map(|t| t.as_str()))
            .bind(self.scope.creator_user_role.as_str())
            .bind(&self.scope.creator_user_id)
            .bind(&execution.workflow_id)
            .bind(execution.workflow_execution_id.as_deref().filter(|id| !id.is_empty()))
            .bind(execution.index)
            .bind(execution.predecessor_node_id.as_deref())
            .bind(&execution.node_id)
            .bind(execution.node_type.as_str())
            .bind(&execution.title)
            .bind(&execution.inputs)
            .bind(&execution.process_data)
            .bind(&execution.outputs)
            .bind(execution.status.as_str())
            .bind(execution.error.as_deref())
            .bind(execution.elapsed_time)
            .bind(encode_metadata(&execution.metadata))
            .bind(execution.created_at)
            .bind(execution.finished_at)
            .execute(&self.pool)
            .await?;

        ensure_written(
            result.rows_affected(),
            "workflow_node_executions",
            &execution.node_execution_id,
        )
    }

    #[instrument(skip(self))]
    async fn fetch_one(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<WorkflowNodeExecution>, DbError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_node_executions \
             WHERE {SCOPE_FILTER} AND node_execution_id = $3"
        );

        let row = sqlx::query_as::<_, NodeExecutionRow>(&query)
            .bind(&self.scope.tenant_id)
            .bind(self.scope.app_id.as_deref())
            .bind(node_execution_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(WorkflowNodeExecution::try_from).transpose()
    }

    #[instrument(skip(self, order_config))]
    async fn fetch_run(
        &self,
        workflow_execution_id: &str,
        status: Option<NodeExecutionStatus>,
        order_config: Option<&OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, DbError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_node_executions \
             WHERE {SCOPE_FILTER} AND workflow_execution_id = $3 \
             AND ($4::text IS NULL OR status = $4) {}",
            order_clause(order_config),
        );

        let rows = sqlx::query_as::<_, NodeExecutionRow>(&query)
            .bind(&self.scope.tenant_id)
            .bind(self.scope.app_id.as_deref())
            .bind(workflow_execution_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(WorkflowNodeExecution::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn delete_scope(&self) -> Result<u64, DbError> {
        let query = format!("DELETE FROM workflow_node_executions WHERE {SCOPE_FILTER}");
        let result = sqlx::query(&query)
            .bind(&self.scope.tenant_id)
            .bind(self.scope.app_id.as_deref())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl WorkflowNodeExecutionRepository for PostgresWorkflowNodeExecutionRepository {
    async fn save(&self, execution: &WorkflowNodeExecution) -> Result<(), RepositoryError> {
        if execution.node_execution_id.is_empty() {
            self.observer.missing_identity(RecordKind::WorkflowNodeExecution);
            return Ok(());
        }

        self.upsert(execution).await?;
        self.observer
            .saved(RecordKind::WorkflowNodeExecution, &execution.node_execution_id);
        Ok(())
    }

    async fn get_by_node_execution_id(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<WorkflowNodeExecution>, RepositoryError> {
        Ok(self.fetch_one(node_execution_id).await?)
    }

    async fn get_by_workflow_run(
        &self,
        workflow_execution_id: &str,
        order_config: Option<&OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError> {
        Ok(self
            .fetch_run(workflow_execution_id, None, order_config)
            .await?)
    }

    async fn get_running_executions(
        &self,
        workflow_execution_id: &str,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError> {
        Ok(self
            .fetch_run(workflow_execution_id, Some(NodeExecutionStatus::Running), None)
            .await?)
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        let count = self.delete_scope().await?;
        self.observer.cleared(
            RecordKind::WorkflowNodeExecution,
            usize::try_from(count).unwrap_or(usize::MAX),
            &self.scope.describe(),
        );
        Ok(())
    }
}
