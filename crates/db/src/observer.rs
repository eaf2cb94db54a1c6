//! Diagnostics hook for the repositories.
//!
//! The repositories never fail on a dropped save, so the only trace of one
//! is what they report here.  [`TracingObserver`] forwards everything to
//! `tracing`; tests inject their own observer to assert on the events.

use std::fmt;

use tracing::{debug, info, warn};

/// Which record type a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    WorkflowExecution,
    WorkflowNodeExecution,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowExecution => write!(f, "workflow execution"),
            Self::WorkflowNodeExecution => write!(f, "workflow node execution"),
        }
    }
}

/// Receives the side-channel events of a repository.
pub trait RepositoryObserver: Send + Sync {
    /// A record was written under `id`.
    fn saved(&self, kind: RecordKind, id: &str);

    /// A record with an empty identity was dropped instead of saved.
    fn missing_identity(&self, kind: RecordKind);

    /// `count` records were removed; `scope` describes the owning tenant/app.
    fn cleared(&self, kind: RecordKind, count: usize, scope: &str);
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RepositoryObserver for TracingObserver {
    fn saved(&self, kind: RecordKind, id: &str) {
        debug!(%kind, id, "saved record");
    }

    fn missing_identity(&self, kind: RecordKind) {
        warn!(%kind, "attempted to save record without an id; dropped");
    }

    fn cleared(&self, kind: RecordKind, count: usize, scope: &str) {
        info!(%kind, count, "cleared {count} {kind} records for {scope}");
    }
}
