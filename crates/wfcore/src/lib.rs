//! Core abstractions for the workflow engine
//!
//! This crate provides the data model every other component depends on:
//! workflow definitions, the node contract, the data items flowing between
//! nodes, the run state of one execution and the error taxonomy. It has no
//! runtime of its own.

mod data;
mod error;
pub mod events;
mod node;
mod run_state;
mod workflow;

pub use data::{NodeExecuteData, PortData, TaskInputs};
pub use error::{EngineError, NodeError, RunError, WorkflowError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, ExecutionId, NodeEvent};
pub use node::{ExecuteContext, NodeOutput, NodeType};
pub use run_state::{ExecutionUnit, Provenance, RunState, RunStatus};
pub use workflow::{Connection, NodeId, NodeRole, NodeSpec, Position, Workflow, WorkflowId};
