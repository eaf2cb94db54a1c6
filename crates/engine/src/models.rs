//! Core domain models for workflow execution history.
//!
//! A [`WorkflowExecution`] is one run of a workflow graph; each step of that
//! run is recorded as a [`WorkflowNodeExecution`].  These types are what the
//! repositories persist.  They serialise to the JSON shape used by the
//! `flowstore` CLI dump format and to the JSONB / text columns of the
//! Postgres backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow execution
// ---------------------------------------------------------------------------

string_enum! {
    /// Kind of application the workflow belongs to.
    pub enum WorkflowType {
        Workflow => "workflow",
        Chat => "chat",
    }
}

string_enum! {
    /// Overall status of a workflow run.
    pub enum WorkflowExecutionStatus {
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Stopped => "stopped",
        /// Finished, but at least one node ended in `exception`.
        PartialSucceeded => "partial-succeeded",
    }
}

/// One run of a workflow graph.
///
/// Created by the engine when a run begins and saved again every time its
/// status, outputs or counters change.  Repositories key it on [`id`].
///
/// [`id`]: WorkflowExecution::id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Identity of the run.  Must be non-empty to be persisted.
    pub id: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub workflow_version: String,
    /// Snapshot of the graph definition the run was started from.
    pub graph: Value,
    pub inputs: Value,
    #[serde(default)]
    pub outputs: Value,
    pub status: WorkflowExecutionStatus,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default)]
    pub total_steps: i32,
    #[serde(default)]
    pub exceptions_count: i32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Begin a new run with a freshly generated id and `running` status.
    pub fn start(
        workflow_id: impl Into<String>,
        workflow_type: WorkflowType,
        workflow_version: impl Into<String>,
        graph: Value,
        inputs: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            workflow_type,
            workflow_version: workflow_version.into(),
            graph,
            inputs,
            outputs: Value::Object(Default::default()),
            status: WorkflowExecutionStatus::Running,
            error_message: String::new(),
            total_tokens: 0,
            total_steps: 0,
            exceptions_count: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Wall-clock seconds between start and finish, or until now while the
    /// run is still going.
    pub fn elapsed_time(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

// ---------------------------------------------------------------------------
// Node execution
// ---------------------------------------------------------------------------

string_enum! {
    /// Type of the node that produced a node execution.
    pub enum NodeType {
        Start => "start",
        End => "end",
        Answer => "answer",
        Llm => "llm",
        KnowledgeRetrieval => "knowledge-retrieval",
        IfElse => "if-else",
        Code => "code",
        TemplateTransform => "template-transform",
        QuestionClassifier => "question-classifier",
        HttpRequest => "http-request",
        Tool => "tool",
        VariableAggregator => "variable-aggregator",
        Assigner => "assigner",
        Loop => "loop",
        LoopStart => "loop-start",
        LoopEnd => "loop-end",
        Iteration => "iteration",
        IterationStart => "iteration-start",
        ParameterExtractor => "parameter-extractor",
        DocumentExtractor => "document-extractor",
        ListOperator => "list-operator",
        Agent => "agent",
    }
}

string_enum! {
    /// Status of a single node execution.
    pub enum NodeExecutionStatus {
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        /// Failed, but the node's error strategy let the run continue.
        Exception => "exception",
        Stopped => "stopped",
        Retry => "retry",
    }
}

string_enum! {
    /// Fixed set of keys allowed in [`WorkflowNodeExecution::metadata`].
    pub enum NodeExecutionMetadataKey {
        TotalTokens => "total_tokens",
        TotalPrice => "total_price",
        Currency => "currency",
        IterationId => "iteration_id",
        IterationIndex => "iteration_index",
        LoopId => "loop_id",
        LoopIndex => "loop_index",
        ParallelId => "parallel_id",
    }
}

/// One step of a workflow run, or a standalone single-step execution when
/// [`workflow_execution_id`] is `None`.
///
/// [`workflow_execution_id`]: WorkflowNodeExecution::workflow_execution_id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNodeExecution {
    /// Persisted row id.
    pub id: String,
    /// Identity used by the repositories.  Must be non-empty to be persisted.
    pub node_execution_id: String,
    pub workflow_id: String,
    #[serde(default)]
    pub workflow_execution_id: Option<String>,
    /// Position of this step within the run.
    pub index: i64,
    #[serde(default)]
    pub predecessor_node_id: Option<String>,
    pub node_id: String,
    pub node_type: NodeType,
    pub title: String,
    #[serde(default)]
    pub inputs: Option<Value>,
    #[serde(default)]
    pub process_data: Option<Value>,
    #[serde(default)]
    pub outputs: Option<Value>,
    pub status: NodeExecutionStatus,
    #[serde(default)]
    pub error: Option<String>,
    /// Seconds spent executing the node.
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(default)]
    pub metadata: BTreeMap<NodeExecutionMetadataKey, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowNodeExecution {
    /// Begin a node execution with freshly generated ids and `running`
    /// status.
    pub fn start(
        workflow_id: impl Into<String>,
        workflow_execution_id: Option<String>,
        index: i64,
        node_id: impl Into<String>,
        node_type: NodeType,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_execution_id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            workflow_execution_id,
            index,
            predecessor_node_id: None,
            node_id: node_id.into(),
            node_type,
            title: title.into(),
            inputs: None,
            process_data: None,
            outputs: None,
            status: NodeExecutionStatus::Running,
            error: None,
            elapsed_time: 0.0,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == NodeExecutionStatus::Running
    }

    /// Overwrite whichever of the payload fields are supplied; `None`
    /// leaves the current value untouched.
    pub fn update_from_mapping(
        &mut self,
        inputs: Option<Value>,
        process_data: Option<Value>,
        outputs: Option<Value>,
        metadata: Option<BTreeMap<NodeExecutionMetadataKey, Value>>,
    ) {
        if inputs.is_some() {
            self.inputs = inputs;
        }
        if process_data.is_some() {
            self.process_data = process_data;
        }
        if outputs.is_some() {
            self.outputs = outputs;
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enums_round_trip_through_their_text_form() {
        for node_type in NodeType::ALL {
            assert_eq!(node_type.as_str().parse::<NodeType>(), Ok(*node_type));
        }
        assert_eq!(
            "partial-succeeded".parse::<WorkflowExecutionStatus>(),
            Ok(WorkflowExecutionStatus::PartialSucceeded)
        );
        assert!("bogus".parse::<NodeExecutionStatus>().is_err());
    }

    #[test]
    fn node_type_serialises_as_kebab_case() {
        let encoded = serde_json::to_value(NodeType::KnowledgeRetrieval).unwrap();
        assert_eq!(encoded, json!("knowledge-retrieval"));
    }

    #[test]
    fn started_execution_is_running_with_a_fresh_id() {
        let a = WorkflowExecution::start("wf", WorkflowType::Workflow, "1", json!({}), json!({}));
        let b = WorkflowExecution::start("wf", WorkflowType::Workflow, "1", json!({}), json!({}));

        assert_eq!(a.status, WorkflowExecutionStatus::Running);
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert!(a.finished_at.is_none());
    }

    #[test]
    fn elapsed_time_uses_finish_timestamp() {
        let mut execution =
            WorkflowExecution::start("wf", WorkflowType::Chat, "1", json!({}), json!({}));
        execution.finished_at = Some(execution.started_at + chrono::Duration::milliseconds(2500));
        assert!((execution.elapsed_time() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn update_from_mapping_only_touches_supplied_fields() {
        let mut node = WorkflowNodeExecution::start(
            "wf",
            Some("run".into()),
            1,
            "n1",
            NodeType::Llm,
            "LLM",
        );
        node.inputs = Some(json!({ "q": "hi" }));

        let mut metadata = BTreeMap::new();
        metadata.insert(NodeExecutionMetadataKey::TotalTokens, json!(42));
        node.update_from_mapping(None, None, Some(json!({ "text": "hello" })), Some(metadata));

        assert_eq!(node.inputs, Some(json!({ "q": "hi" })));
        assert_eq!(node.outputs, Some(json!({ "text": "hello" })));
        assert_eq!(
            node.metadata.get(&NodeExecutionMetadataKey::TotalTokens),
            Some(&json!(42))
        );
    }

    #[test]
    fn node_execution_deserialises_with_defaults() {
        let node: WorkflowNodeExecution = serde_json::from_value(json!({
            "id": "row-1",
            "node_execution_id": "ne-1",
            "workflow_id": "wf",
            "index": 1,
            "node_id": "start",
            "node_type": "start",
            "title": "Start",
            "status": "succeeded",
            "created_at": "2023-01-01T10:00:00Z",
            "metadata": { "total_price": "0.0" }
        }))
        .unwrap();

        assert!(node.workflow_execution_id.is_none());
        assert_eq!(node.status, NodeExecutionStatus::Succeeded);
        assert_eq!(
            node.metadata.get(&NodeExecutionMetadataKey::TotalPrice),
            Some(&json!("0.0"))
        );
    }
}
