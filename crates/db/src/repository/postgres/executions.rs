//! Postgres workflow execution repository.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use engine::{
    CallerIdentity, RepositoryError, RepositoryScope, WorkflowExecution,
    WorkflowExecutionRepository, WorkflowRunTriggeredFrom,
};

use super::ensure_written;
use crate::models::WorkflowExecutionRow;
use crate::observer::{RecordKind, RepositoryObserver, TracingObserver};
use crate::{DbError, DbPool};

const SELECT_COLUMNS: &str = r#"
    id, workflow_id, workflow_type, workflow_version, graph, inputs, outputs,
    status, error_message, total_tokens, total_steps, exceptions_count,
    started_at, finished_at
"#;

/// Insert or update one execution.  A conflicting row owned by another
/// tenant/app is left alone, so the statement affects no rows.
pub(crate) const UPSERT: &str = r#"
    INSERT INTO workflow_executions (
        id, tenant_id, app_id, triggered_from, created_by_role, created_by,
        workflow_id, workflow_type, workflow_version, graph, inputs, outputs,
        status, error_message, total_tokens, total_steps, exceptions_count,
        started_at, finished_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
    ON CONFLICT (id) DO UPDATE SET
        graph            = EXCLUDED.graph,
        inputs           = EXCLUDED.inputs,
        outputs          = EXCLUDED.outputs,
        status           = EXCLUDED.status,
        error_message    = EXCLUDED.error_message,
        total_tokens     = EXCLUDED.total_tokens,
        total_steps      = EXCLUDED.total_steps,
        exceptions_count = EXCLUDED.exceptions_count,
        finished_at      = EXCLUDED.finished_at
    WHERE workflow_executions.tenant_id = EXCLUDED.tenant_id
      AND workflow_executions.app_id IS NOT DISTINCT FROM EXCLUDED.app_id
"#;

/// Workflow executions stored in the `workflow_executions` table.
pub struct PostgresWorkflowExecutionRepository {
    pool: DbPool,
    scope: RepositoryScope<WorkflowRunTriggeredFrom>,
    observer: Arc<dyn RepositoryObserver>,
}

impl PostgresWorkflowExecutionRepository {
    /// # Errors
    /// [`RepositoryError::InvalidContext`] if `user` has no tenant.
    pub fn new(
        pool: DbPool,
        user: &CallerIdentity,
        app_id: Option<String>,
        triggered_from: Option<WorkflowRunTriggeredFrom>,
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

    #[instrument(skip(self, execution), fields(id = %execution.id))]
    async fn upsert(&self, execution: &WorkflowExecution) -> Result<(), DbError> {
        let result = sqlx::query(UPSERT)
            .bind(&execution.id)
            .bind(&self.scope.tenant_id)
            .bind(self.scope.app_id.as_deref())
            .bind(self.scope.triggered_from.map(|t| t.as_str()))
            .bind(self.scope.creator_user_role.as_str())
            .bind(&self.scope.creator_user_id)
            .bind(&execution.workflow_id)
            .bind(execution.workflow_type.as_str())
            .bind(&execution.workflow_version)
            .bind(&execution.graph)
            .bind(&execution.inputs)
            .bind(&execution.outputs)
            .bind(execution.status.as_str())
            .bind(&execution.error_message)
            .bind(execution.total_tokens)
            .bind(execution.total_steps)
            .bind(execution.exceptions_count)
            .bind(execution.started_at)
            .bind(execution.finished_at)
            .execute(&self.pool)
            .await?;

        ensure_written(result.rows_affected(), "workflow_executions", &execution.id)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, execution_id: &str) -> Result<Option<WorkflowExecution>, DbError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_executions \
             WHERE id = $1 AND tenant_id = $2 AND ($3::text IS NULL OR app_id = $3)"
        );

        let row = sqlx::query_as::<_, WorkflowExecutionRow>(&query)
            .bind(execution_id)
            .bind(&self.scope.tenant_id)
            .bind(self.scope.app_id.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        row.map(WorkflowExecution::try_from).transpose()
    }
}

#[async_trait]
impl WorkflowExecutionRepository for PostgresWorkflowExecutionRepository {
    async fn save(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        if execution.id.is_empty() {
            self.observer.missing_identity(RecordKind::WorkflowExecution);
            return Ok(());
        }

        self.upsert(execution).await?;
        self.observer.saved(RecordKind::WorkflowExecution, &execution.id);
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self.fetch(execution_id).await?)
    }
}
