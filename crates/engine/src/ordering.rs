//! Ordering of node-execution listings.
//!
//! An [`OrderConfig`] names record fields by string, the way callers pass
//! them over an API.  Field names map onto typed accessors through
//! [`WorkflowNodeExecution::sort_key`]; a name that is not a sortable field,
//! and a field whose value is `None`, both yield [`SortKey::Empty`], so an
//! ordering request can never fail.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::WorkflowNodeExecution;

string_enum! {
    /// Direction applied to every field of an [`OrderConfig`].
    pub enum OrderDirection {
        Asc => "asc",
        Desc => "desc",
    }
}

impl Default for OrderDirection {
    fn default() -> Self {
        Self::Asc
    }
}

/// Requested ordering for `get_by_workflow_run`.
///
/// The first entry of `order_by` is the most significant key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderConfig {
    pub order_by: Vec<String>,
    pub direction: OrderDirection,
}

impl OrderConfig {
    pub fn new<I, S>(order_by: I, direction: OrderDirection) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order_by: order_by.into_iter().map(Into::into).collect(),
            direction,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order_by.is_empty()
    }

    /// Sort `records` in place.
    ///
    /// Runs one stable sort per field, least significant first, so earlier
    /// fields dominate and later ones only break ties.
    pub fn sort(&self, records: &mut [WorkflowNodeExecution]) {
        for field in self.order_by.iter().rev() {
            let field = field.as_str();
            match self.direction {
                OrderDirection::Asc => {
                    records.sort_by(|a, b| a.sort_key(field).cmp(&b.sort_key(field)))
                }
                OrderDirection::Desc => {
                    records.sort_by(|a, b| b.sort_key(field).cmp(&a.sort_key(field)))
                }
            }
        }
    }
}

/// Comparable view of one field of a record.
#[derive(Debug, Clone, Copy)]
pub enum SortKey<'a> {
    /// Unknown field or absent value.  Compares like an empty string.
    Empty,
    Int(i64),
    Float(f64),
    Text(&'a str),
    Time(DateTime<Utc>),
}

impl SortKey<'_> {
    // Only orders a kind against `Empty`.  Every field must yield a single
    // kind plus `Empty`, otherwise the ordering stops being total.
    fn rank(&self) -> u8 {
        match self {
            SortKey::Empty => 0,
            SortKey::Int(_) => 1,
            SortKey::Float(_) => 2,
            SortKey::Text(_) => 3,
            SortKey::Time(_) => 4,
        }
    }
}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        use SortKey::*;

        match (self, other) {
            (Empty, Empty) => Ordering::Equal,
            (Empty, Text(b)) => "".cmp(*b),
            (Text(a), Empty) => (*a).cmp(""),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Time(a), Time(b)) => a.cmp(b),
            // Mixed kinds only meet when one side is the sentinel.
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey<'_> {}

fn text_or_empty(value: Option<&str>) -> SortKey<'_> {
    value.map_or(SortKey::Empty, SortKey::Text)
}

impl WorkflowNodeExecution {
    /// Field names accepted by [`WorkflowNodeExecution::sort_key`].
    pub const SORTABLE_FIELDS: &'static [&'static str] = &[
        "id",
        "node_execution_id",
        "workflow_id",
        "workflow_execution_id",
        "index",
        "predecessor_node_id",
        "node_id",
        "node_type",
        "title",
        "status",
        "error",
        "elapsed_time",
        "created_at",
        "finished_at",
    ];

    /// Sort key for the field called `field`.
    ///
    /// Enums sort by their text form.  JSON payload fields and unknown names
    /// are not sortable and return [`SortKey::Empty`].
    pub fn sort_key(&self, field: &str) -> SortKey<'_> {
        match field {
            "id" => SortKey::Text(&self.id),
            "node_execution_id" => SortKey::Text(&self.node_execution_id),
            "workflow_id" => SortKey::Text(&self.workflow_id),
            "workflow_execution_id" => text_or_empty(self.workflow_execution_id.as_deref()),
            "index" => SortKey::Int(self.index),
            "predecessor_node_id" => text_or_empty(self.predecessor_node_id.as_deref()),
            "node_id" => SortKey::Text(&self.node_id),
            "node_type" => SortKey::Text(self.node_type.as_str()),
            "title" => SortKey::Text(&self.title),
            "status" => SortKey::Text(self.status.as_str()),
            "error" => text_or_empty(self.error.as_deref()),
            "elapsed_time" => SortKey::Float(self.elapsed_time),
            "created_at" => SortKey::Time(self.created_at),
            "finished_at" => self.finished_at.map_or(SortKey::Empty, SortKey::Time),
            _ => SortKey::Empty,
        }
    }
}
