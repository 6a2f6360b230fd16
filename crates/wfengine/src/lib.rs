//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows: the node type
//! registry, structural validation of the connection graph, the stack-based
//! execution driver and the entry point tying them together.

mod executor;
mod graph;
mod record;
mod registry;
mod runtime;

pub use executor::ExecutionDriver;
pub use graph::{Target, WorkflowGraph};
pub use record::{ExecutionRecord, ExecutionResult};
pub use registry::{NodeRegistry, NodeTypeInfo};
pub use runtime::{EngineConfig, WorkflowEngine};
