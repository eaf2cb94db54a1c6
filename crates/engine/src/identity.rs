//! Caller identity and the per-repository scope derived from it.
//!
//! Repositories are constructed for one caller.  The caller is either an
//! authenticated workspace account or an anonymous end-user of a published
//! app; both carry a tenant id, in different places.  [`RepositoryScope`]
//! resolves that once so the repositories only ever see plain fields.

use serde::{Deserialize, Serialize};

use crate::RepositoryError;

/// Who is asking for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// A workspace member.  The tenant is whichever workspace is current.
    Account {
        id: String,
        current_tenant_id: Option<String>,
    },
    /// An end-user of a published app, bound to exactly one tenant.
    EndUser {
        id: String,
        tenant_id: Option<String>,
    },
}

impl CallerIdentity {
    pub fn id(&self) -> &str {
        match self {
            Self::Account { id, .. } | Self::EndUser { id, .. } => id,
        }
    }

    /// The tenant this caller acts for, if one is set and non-empty.
    pub fn tenant_id(&self) -> Option<&str> {
        let tenant = match self {
            Self::Account { current_tenant_id, .. } => current_tenant_id.as_deref(),
            Self::EndUser { tenant_id, .. } => tenant_id.as_deref(),
        };
        tenant.filter(|t| !t.is_empty())
    }

    pub fn role(&self) -> CreatorUserRole {
        match self {
            Self::Account { .. } => CreatorUserRole::Account,
            Self::EndUser { .. } => CreatorUserRole::EndUser,
        }
    }
}

string_enum! {
    /// Role recorded as the creator of persisted executions.
    pub enum CreatorUserRole {
        Account => "account",
        EndUser => "end_user",
    }
}

string_enum! {
    /// Where a workflow run was started from.
    pub enum WorkflowRunTriggeredFrom {
        Debugging => "debugging",
        AppRun => "app-run",
    }
}

string_enum! {
    /// Where a node execution was started from.
    pub enum WorkflowNodeExecutionTriggeredFrom {
        SingleStep => "single-step",
        WorkflowRun => "workflow-run",
    }
}

/// Owning context of a repository instance.
///
/// `T` is the trigger-source enum for the record type the repository holds:
/// [`WorkflowRunTriggeredFrom`] or [`WorkflowNodeExecutionTriggeredFrom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryScope<T> {
    pub tenant_id: String,
    pub app_id: Option<String>,
    pub triggered_from: Option<T>,
    pub creator_user_id: String,
    pub creator_user_role: CreatorUserRole,
}

impl<T> RepositoryScope<T> {
    /// Resolve the scope for `user`.
    ///
    /// # Errors
    /// [`RepositoryError::InvalidContext`] when the caller has no tenant id.
    pub fn resolve(
        user: &CallerIdentity,
        app_id: Option<String>,
        triggered_from: Option<T>,
    ) -> Result<Self, RepositoryError> {
        let tenant_id = user.tenant_id().ok_or_else(|| {
            RepositoryError::InvalidContext(
                "user must have a tenant_id or current_tenant_id".into(),
            )
        })?;

        Ok(Self {
            tenant_id: tenant_id.to_owned(),
            app_id,
            triggered_from,
            creator_user_id: user.id().to_owned(),
            creator_user_role: user.role(),
        })
    }

    /// Human-readable `tenant [and app]` label for diagnostics.
    pub fn describe(&self) -> String {
        match &self.app_id {
            Some(app_id) => format!("tenant {} and app {}", self.tenant_id, app_id),
            None => format!("tenant {}", self.tenant_id),
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn account(tenant: Option<&str>) -> CallerIdentity {
        CallerIdentity::Account {
            id: "test-user-id".into(),
            current_tenant_id: tenant.map(Into::into),
        }
    }

    #[test]
    fn account_scope_uses_current_tenant() {
        let scope = RepositoryScope::resolve(
            &account(Some("test-tenant")),
            Some("test-app".into()),
            Some(WorkflowRunTriggeredFrom::AppRun),
        )
        .expect("tenant is set");

        assert_eq!(scope.tenant_id, "test-tenant");
        assert_eq!(scope.app_id.as_deref(), Some("test-app"));
        assert_eq!(scope.triggered_from, Some(WorkflowRunTriggeredFrom::AppRun));
        assert_eq!(scope.creator_user_id, "test-user-id");
        assert_eq!(scope.creator_user_role, CreatorUserRole::Account);
    }

    #[test]
    fn end_user_scope_uses_bound_tenant() {
        let user = CallerIdentity::EndUser {
            id: "test-end-user-id".into(),
            tenant_id: Some("test-tenant".into()),
        };
        let scope = RepositoryScope::resolve(
            &user,
            None,
            Some(WorkflowNodeExecutionTriggeredFrom::SingleStep),
        )
        .unwrap();

        assert_eq!(scope.tenant_id, "test-tenant");
        assert_eq!(scope.creator_user_id, "test-end-user-id");
        assert_eq!(scope.creator_user_role, CreatorUserRole::EndUser);
        assert_eq!(scope.describe(), "tenant test-tenant");
    }

    #[test]
    fn missing_or_empty_tenant_is_rejected() {
        for user in [account(None), account(Some(""))] {
            let result = RepositoryScope::<WorkflowRunTriggeredFrom>::resolve(&user, None, None);
            assert!(matches!(
                result,
                Err(RepositoryError::InvalidContext(msg)) if msg.contains("tenant_id")
            ));
        }
    }

    #[test]
    fn identity_deserialises_from_tagged_json() {
        let user: CallerIdentity = serde_json::from_str(
            r#"{ "kind": "end_user", "id": "u1", "tenant_id": "t1" }"#,
        )
        .unwrap();
        assert_eq!(user.tenant_id(), Some("t1"));
        assert_eq!(user.role(), CreatorUserRole::EndUser);
    }
}
