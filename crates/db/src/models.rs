//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models: enums are plain text and documents are
//! raw JSON.  Conversion into the `engine` domain types is fallible because
//! a row may hold text no enum variant matches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use engine::{NodeExecutionMetadataKey, WorkflowExecution, WorkflowNodeExecution};

use crate::DbError;

fn parse_column<T>(column: &'static str, raw: &str) -> Result<T, DbError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(|message| DbError::Decode { column, message })
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// A persisted workflow execution row (scope columns omitted).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecutionRow {
    pub id: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub workflow_version: String,
    pub graph: serde_json::Value,
    pub inputs: serde_json::Value,
    pub outputs: Option<serde_json::Value>,
    pub status: String,
    pub error_message: Option<String>,
    pub total_tokens: i64,
    pub total_steps: i32,
    pub exceptions_count: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkflowExecutionRow> for WorkflowExecution {
    type Error = DbError;

    fn try_from(row: WorkflowExecutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            workflow_type: parse_column("workflow_type", &row.workflow_type)?,
            status: parse_column("status", &row.status)?,
            id: row.id,
            workflow_id: row.workflow_id,
            workflow_version: row.workflow_version,
            graph: row.graph,
            inputs: row.inputs,
            outputs: row.outputs.unwrap_or_default(),
            error_message: row.error_message.unwrap_or_default(),
            total_tokens: row.total_tokens,
            total_steps: row.total_steps,
            exceptions_count: row.exceptions_count,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

// ---------------------------------------------------------------------------
// workflow_node_executions
// ---------------------------------------------------------------------------

/// A persisted node execution row (scope columns omitted).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: String,
    pub node_execution_id: String,
    pub workflow_id: String,
    pub workflow_execution_id: Option<String>,
    pub index: i64,
    pub predecessor_node_id: Option<String>,
    pub node_id: String,
    pub node_type: String,
    pub title: String,
    pub inputs: Option<serde_json::Value>,
    pub process_data: Option<serde_json::Value>,
    pub outputs: Option<serde_json::Value>,
    pub status: String,
    pub error: Option<String>,
    pub elapsed_time: f64,
    /// JSON object keyed by `NodeExecutionMetadataKey` text.
    pub execution_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<NodeExecutionRow> for WorkflowNodeExecution {
    type Error = DbError;

    fn try_from(row: NodeExecutionRow) -> Result<Self, Self::Error> {
        let metadata: BTreeMap<NodeExecutionMetadataKey, serde_json::Value> =
            serde_json::from_value(row.execution_metadata).map_err(|e| DbError::Decode {
                column: "execution_metadata",
                message: e.to_string(),
            })?;

        Ok(Self {
            node_type: parse_column("node_type", &row.node_type)?,
            status: parse_column("status", &row.status)?,
            id: row.id,
            node_execution_id: row.node_execution_id,
            workflow_id: row.workflow_id,
            workflow_execution_id: row.workflow_execution_id,
            index: row.index,
            predecessor_node_id: row.predecessor_node_id,
            node_id: row.node_id,
            title: row.title,
            inputs: row.inputs,
            process_data: row.process_data,
            outputs: row.outputs,
            error: row.error,
            elapsed_time: row.elapsed_time,
            metadata,
            created_at: row.created_at,
            finished_at: row.finished_at,
        })
    }
}

/// Encode node metadata for the `execution_metadata` JSONB column.
pub fn encode_metadata(
    metadata: &BTreeMap<NodeExecutionMetadataKey, serde_json::Value>,
) -> serde_json::Value {
    serde_json::Value::Object(
        metadata
            .iter()
            .map(|(key, value)| (key.as_str().to_owned(), value.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{NodeExecutionStatus, NodeType, WorkflowExecutionStatus, WorkflowType};
    use serde_json::json;

    fn node_row() -> NodeExecutionRow {
        NodeExecutionRow {
            id: "row-1".into(),
            node_execution_id: "ne-1".into(),
            workflow_id: "wf".into(),
            workflow_execution_id: Some("run".into()),
            index: 2,
            predecessor_node_id: None,
            node_id: "llm".into(),
            node_type: "llm".into(),
            title: "LLM".into(),
            inputs: None,
            process_data: None,
            outputs: Some(json!({ "text": "hi" })),
            status: "exception".into(),
            error: Some("boom".into()),
            elapsed_time: 0.25,
            execution_metadata: json!({ "total_tokens": 12 }),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    #[test]
    fn node_row_converts_to_domain() {
        let node = WorkflowNodeExecution::try_from(node_row()).unwrap();

        assert_eq!(node.node_type, NodeType::Llm);
        assert_eq!(node.status, NodeExecutionStatus::Exception);
        assert_eq!(
            node.metadata.get(&NodeExecutionMetadataKey::TotalTokens),
            Some(&json!(12))
        );
        assert_eq!(encode_metadata(&node.metadata), json!({ "total_tokens": 12 }));
    }

    #[test]
    fn unknown_enum_text_is_a_decode_error() {
        let mut row = node_row();
        row.node_type = "teleport".into();

        assert!(matches!(
            WorkflowNodeExecution::try_from(row),
            Err(DbError::Decode { column: "node_type", .. })
        ));
    }

    #[test]
    fn unknown_metadata_key_is_a_decode_error() {
        let mut row = node_row();
        row.execution_metadata = json!({ "mystery": 1 });

        assert!(matches!(
            WorkflowNodeExecution::try_from(row),
            Err(DbError::Decode { column: "execution_metadata", .. })
        ));
    }

    #[test]
    fn execution_row_fills_missing_optionals() {
        let row = WorkflowExecutionRow {
            id: "run".into(),
            workflow_id: "wf".into(),
            workflow_type: "chat".into(),
            workflow_version: "draft".into(),
            graph: json!({}),
            inputs: json!({}),
            outputs: None,
            status: "partial-succeeded".into(),
            error_message: None,
            total_tokens: 7,
            total_steps: 3,
            exceptions_count: 1,
            started_at: Utc::now(),
            finished_at: None,
        };

        let execution = WorkflowExecution::try_from(row).unwrap();
        assert_eq!(execution.workflow_type, WorkflowType::Chat);
        assert_eq!(execution.status, WorkflowExecutionStatus::PartialSucceeded);
        assert_eq!(execution.outputs, serde_json::Value::Null);
        assert_eq!(execution.error_message, "");
    }
}
