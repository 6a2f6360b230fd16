use crate::{ExecutionId, NodeId, RunState};
use thiserror::Error;

/// Fatal conditions that abort a run
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Node type '{node_type}' not found for node '{node_id}'")]
    NodeTypeNotFound { node_id: NodeId, node_type: String },

    #[error("Node '{node_id}' failed: {source}")]
    NodeExecution {
        node_id: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("Workflow graph contains a cycle through node '{node_id}'")]
    GraphCycle { node_id: NodeId },

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(#[from] WorkflowError),
}

impl EngineError {
    /// Id of the node the error is attributed to, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            EngineError::NodeTypeNotFound { node_id, .. }
            | EngineError::NodeExecution { node_id, .. }
            | EngineError::GraphCycle { node_id } => Some(node_id),
            EngineError::InvalidWorkflow(_) => None,
        }
    }
}

/// Errors raised by node implementations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Invalid input for '{field}': expected {expected}")]
    InvalidInput { field: String, expected: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Structural problems found while validating a workflow definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow has no nodes")]
    Empty,

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Connection references unknown {side} node '{node_id}'")]
    UnknownNode { node_id: NodeId, side: &'static str },
}

/// A failed run: the fatal error plus everything recorded before it
#[derive(Error, Debug)]
#[error("Execution {execution_id} failed: {error}")]
pub struct RunError {
    pub execution_id: ExecutionId,
    #[source]
    pub error: EngineError,
    pub state: Box<RunState>,
}

impl RunError {
    pub fn new(execution_id: ExecutionId, error: EngineError, state: RunState) -> Self {
        Self {
            execution_id,
            error,
            state: Box::new(state),
        }
    }

    /// Node whose failure aborted the run
    pub fn failed_node(&self) -> Option<&str> {
        self.error.node_id()
    }

    /// Last node that completed successfully before the failure
    pub fn last_completed(&self) -> Option<&str> {
        self.state.last_completed.as_deref()
    }
}
