//! Repository backends, one module per storage technology.
//!
//! Both backends implement the `engine` repository traits with identical
//! semantics for callers; they differ only in durability and in whether
//! the tenant/app scope is enforced on reads.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryWorkflowExecutionRepository, InMemoryWorkflowNodeExecutionRepository};
pub use postgres::{PostgresWorkflowExecutionRepository, PostgresWorkflowNodeExecutionRepository};
