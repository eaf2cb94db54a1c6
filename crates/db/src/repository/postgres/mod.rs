//! Postgres repository backends.
//!
//! Unlike the in-memory stores these enforce the tenant/app scope in SQL:
//! every read and `clear` is filtered by the `tenant_id` and, when the
//! repository was built with one, the `app_id` it was constructed for.  An
//! upsert never rewrites a row owned by another tenant/app; it fails with
//! [`DbError::ScopeConflict`] instead.

mod executions;
mod node_executions;

pub use executions::PostgresWorkflowExecutionRepository;
pub use node_executions::PostgresWorkflowNodeExecutionRepository;

use engine::{OrderConfig, OrderDirection};

use crate::DbError;

/// Final sort keys.  Rows that tie on every requested field come back in
/// creation order, as the in-memory store returns them in first-save order.
const TIE_BREAKER: &str = "created_at ASC, node_execution_id ASC";

/// An upsert whose guarded `DO UPDATE` matched nothing hit a row owned by
/// another scope.
fn ensure_written(rows_affected: u64, table: &'static str, id: &str) -> Result<(), DbError> {
    if rows_affected == 0 {
        return Err(DbError::ScopeConflict {
            table,
            id: id.to_owned(),
        });
    }
    Ok(())
}

/// Map a sortable field name onto its column.  Unknown names map to `None`
/// and are skipped, matching the in-memory behaviour of ignoring them.
fn sort_column(field: &str) -> Option<&'static str> {
    let column = match field {
        "id" => "id",
        "node_execution_id" => "node_execution_id",
        "workflow_id" => "workflow_id",
        "workflow_execution_id" => "workflow_execution_id",
        "index" => "\"index\"",
        "predecessor_node_id" => "predecessor_node_id",
        "node_id" => "node_id",
        "node_type" => "node_type",
        "title" => "title",
        "status" => "status",
        "error" => "error",
        "elapsed_time" => "elapsed_time",
        "created_at" => "created_at",
        "finished_at" => "finished_at",
        _ => return None,
    };
    Some(column)
}

/// Build the `ORDER BY` clause for a node execution listing.
///
/// Only whitelisted column names are ever interpolated.  NULLs are placed
/// where the in-memory sort puts absent values: first when ascending, last
/// when descending.  Without a usable ordering the rows come back in
/// creation order.
pub(crate) fn order_clause(order_config: Option<&OrderConfig>) -> String {
    let (columns, direction) = match order_config {
        Some(config) => (
            config
                .order_by
                .iter()
                .filter_map(|field| sort_column(field))
                .collect::<Vec<_>>(),
            config.direction,
        ),
        None => (Vec::new(), OrderDirection::Asc),
    };

    if columns.is_empty() {
        return format!("ORDER BY {TIE_BREAKER}");
    }

    let suffix = match direction {
        OrderDirection::Asc => "ASC NULLS FIRST",
        OrderDirection::Desc => "DESC NULLS LAST",
    };
    let terms: Vec<String> = columns
        .into_iter()
        .map(|column| format!("{column} {suffix}"))
        .collect();
    format!("ORDER BY {}, {TIE_BREAKER}", terms.join(", "))
}
