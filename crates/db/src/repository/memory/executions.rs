//! In-memory workflow execution repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use engine::{
    CallerIdentity, RepositoryError, RepositoryScope, WorkflowExecution,
    WorkflowExecutionRepository, WorkflowRunTriggeredFrom,
};

use crate::observer::{RecordKind, RepositoryObserver, TracingObserver};

/// Keeps workflow executions in a map owned by this instance.
///
/// Useful for tests and for ephemeral runs where nothing has to outlive the
/// process.  Records are stored as saved; the tenant/app scope is recorded
/// but not enforced on reads.
pub struct InMemoryWorkflowExecutionRepository {
    scope: RepositoryScope<WorkflowRunTriggeredFrom>,
    executions: RwLock<HashMap<String, WorkflowExecution>>,
    observer: Arc<dyn RepositoryObserver>,
}

impl InMemoryWorkflowExecutionRepository {
    /// Create an empty repository scoped to `user`.
    ///
    /// # Errors
    /// [`RepositoryError::InvalidContext`] if `user` has no tenant.
    pub fn new(
        user: &CallerIdentity,
        app_id: Option<String>,
        triggered_from: Option<WorkflowRunTriggeredFrom>,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            scope: RepositoryScope::resolve(user, app_id, triggered_from)?,
            executions: RwLock::new(HashMap::new()),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the default `tracing` diagnostics.
    pub fn with_observer(mut self, observer: Arc<dyn RepositoryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn scope(&self) -> &RepositoryScope<WorkflowRunTriggeredFrom> {
        &self.scope
    }

    /// Number of stored executions.
    pub fn len(&self) -> usize {
        self.executions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Reads go through here so a scoped backend can hide foreign records
    // without changing callers.  Everything stored here is in scope.
    fn matches_constraints(&self, _execution: &WorkflowExecution) -> bool {
        true
    }
}

#[async_trait]
impl WorkflowExecutionRepository for InMemoryWorkflowExecutionRepository {
    async fn save(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        if execution.id.is_empty() {
            self.observer.missing_identity(RecordKind::WorkflowExecution);
            return Ok(());
        }

        self.executions
            .write()
            .insert(execution.id.clone(), execution.clone());
        self.observer.saved(RecordKind::WorkflowExecution, &execution.id);
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> Result<Option<WorkflowExecution>, RepositoryError> {
        let executions = self.executions.read();
        Ok(executions
            .get(execution_id)
            .filter(|execution| self.matches_constraints(execution))
            .cloned())
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::recording::RecordingObserver;
    use chrono::Utc;
    use engine::{CreatorUserRole, WorkflowExecutionStatus, WorkflowType};
    use serde_json::json;

    fn account_user() -> CallerIdentity {
        CallerIdentity::Account {
            id: "test-user-id".into(),
            current_tenant_id: Some("test-tenant".into()),
        }
    }

    fn repository() -> InMemoryWorkflowExecutionRepository {
        InMemoryWorkflowExecutionRepository::new(
            &account_user(),
            Some("test-app".into()),
            Some(WorkflowRunTriggeredFrom::AppRun),
        )
        .expect("account has a tenant")
    }

    fn sample_execution(id: &str) -> WorkflowExecution {
        WorkflowExecution {
            id: id.into(),
            workflow_id: "test-workflow-id".into(),
            workflow_type: WorkflowType::Workflow,
            workflow_version: "1".into(),
            graph: json!({ "nodes": [], "edges": [] }),
            inputs: json!({ "input_key": "input_value" }),
            outputs: json!({ "output_key": "output_value" }),
            status: WorkflowExecutionStatus::Running,
            error_message: String::new(),
            total_tokens: 100,
            total_steps: 5,
            exceptions_count: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    #[test]
    fn construction_records_account_scope() {
        let repo = repository();
        let scope = repo.scope();

        assert_eq!(scope.tenant_id, "test-tenant");
        assert_eq!(scope.app_id.as_deref(), Some("test-app"));
        assert_eq!(scope.triggered_from, Some(WorkflowRunTriggeredFrom::AppRun));
        assert_eq!(scope.creator_user_id, "test-user-id");
        assert_eq!(scope.creator_user_role, CreatorUserRole::Account);
    }

    #[test]
    fn construction_records_end_user_scope() {
        let user = CallerIdentity::EndUser {
            id: "test-end-user-id".into(),
            tenant_id: Some("test-tenant".into()),
        };
        let repo = InMemoryWorkflowExecutionRepository::new(
            &user,
            Some("test-app".into()),
            Some(WorkflowRunTriggeredFrom::Debugging),
        )
        .unwrap();

        assert_eq!(repo.scope().tenant_id, "test-tenant");
        assert_eq!(repo.scope().triggered_from, Some(WorkflowRunTriggeredFrom::Debugging));
        assert_eq!(repo.scope().creator_user_role, CreatorUserRole::EndUser);
    }

    #[test]
    fn construction_without_tenant_fails() {
        let user = CallerIdentity::Account {
            id: "test-user-id".into(),
            current_tenant_id: None,
        };
        let result = InMemoryWorkflowExecutionRepository::new(&user, Some("test-app".into()), None);
        assert!(matches!(result, Err(RepositoryError::InvalidContext(_))));
    }

    #[tokio::test]
    async fn save_then_get_returns_the_record() {
        let repo = repository();
        let execution = sample_execution("test-execution-id");

        repo.save(&execution).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("test-execution-id").await.unwrap(), Some(execution));
    }

    #[tokio::test]
    async fn save_without_id_is_dropped_with_a_diagnostic() {
        let observer = RecordingObserver::default();
        let repo = repository().with_observer(Arc::new(observer.clone()));

        repo.save(&sample_execution("")).await.unwrap();

        assert!(repo.is_empty());
        assert_eq!(observer.events(), ["missing id workflow execution"]);
    }

    #[tokio::test]
    async fn resave_overwrites_previous_content() {
        let repo = repository();
        let mut execution = sample_execution("run-1");
        repo.save(&execution).await.unwrap();

        execution.status = WorkflowExecutionStatus::Succeeded;
        execution.outputs = json!({ "answer": 42 });
        execution.finished_at = Some(Utc::now());
        repo.save(&execution).await.unwrap();

        assert_eq!(repo.len(), 1);
        let stored = repo.get("run-1").await.unwrap().unwrap();
        assert_eq!(stored.status, WorkflowExecutionStatus::Succeeded);
        assert_eq!(stored.outputs, json!({ "answer": 42 }));
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let repo = repository();
        assert_eq!(repo.get("non-existent-id").await.unwrap(), None);
    }

    #[test]
    fn constraint_check_accepts_stored_records() {
        let repo = repository();
        assert!(repo.matches_constraints(&sample_execution("any")));
    }
}
