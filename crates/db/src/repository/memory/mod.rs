//! In-memory repository backends.
//!
//! Each instance owns its maps; two repositories never see each other's
//! records, even for the same tenant.

mod executions;
mod node_executions;

pub use executions::InMemoryWorkflowExecutionRepository;
pub use node_executions::InMemoryWorkflowNodeExecutionRepository;
