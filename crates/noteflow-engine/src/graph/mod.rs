//! Workflow graph — validated definitions, the node execution shell, and
//! the run engine.
//!
//! A workflow is a DAG of named nodes connected by dependency edges, with
//! a derived entry node and one or more finish nodes. The engine walks the
//! graph in readiness order, running independent branches concurrently and
//! isolating per-node failures so the rest of the run keeps progressing.

pub mod definition;
pub mod executor;
pub mod runner;

pub use definition::{EdgeSpec, NodeSpec, WorkflowBuilder, WorkflowDefinition};
pub use executor::WorkflowEngine;
pub use runner::{NodeRun, NodeRunner};
