use crate::{events::EventEmitter, NodeError, NodeExecuteData, NodeId, PortData, Provenance, TaskInputs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Core trait that all executable node types implement
#[async_trait]
pub trait NodeType: Send + Sync {
    /// Unique type identifier (e.g., "trigger.manual", "flow.merge")
    fn type_id(&self) -> &str;

    /// Execute one invocation and return the ordered output ports
    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError>;

    /// Short human readable description, used by node listings
    fn description(&self) -> &str {
        ""
    }

    fn category(&self) -> &str {
        "general"
    }
}

/// Execution context passed to each invocation
#[derive(Clone)]
pub struct ExecuteContext {
    pub node_id: NodeId,

    pub node_type: String,

    /// Static configuration of this node
    pub metadata: serde_json::Value,

    /// Data accumulated on each input port
    pub inputs: TaskInputs,

    /// Node and output port that produced the inputs, if a single one did
    pub source: Option<Provenance>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancellation token of the run
    pub cancellation: CancellationToken,
}

impl ExecuteContext {
    /// Items received on port 0
    pub fn input_data(&self) -> &[NodeExecuteData] {
        self.input(0)
    }

    /// Items received on the given port, empty if none arrived
    pub fn input(&self, port: usize) -> &[NodeExecuteData] {
        self.inputs.get(&port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get metadata value or return error
    pub fn require_metadata(&self, key: &str) -> Result<&serde_json::Value, NodeError> {
        self.metadata
            .get(key)
            .ok_or_else(|| NodeError::Configuration(format!("Missing metadata: {}", key)))
    }

    /// Get metadata with default
    pub fn metadata_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.metadata.get(key).cloned().unwrap_or(default)
    }
}

/// Output of one invocation: an ordered sequence of ports.
///
/// An empty port emits nothing and triggers none of its connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeOutput {
    pub ports: Vec<PortData>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output with a single port carrying `items`
    pub fn single(items: PortData) -> Self {
        Self { ports: vec![items] }
    }

    /// Append the next port
    pub fn with_port(mut self, items: PortData) -> Self {
        self.ports.push(items);
        self
    }

    pub fn port(&self, index: usize) -> &[NodeExecuteData] {
        self.ports.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of items on each port
    pub fn item_counts(&self) -> Vec<usize> {
        self.ports.iter().map(Vec::len).collect()
    }
}

impl From<Vec<PortData>> for NodeOutput {
    fn from(ports: Vec<PortData>) -> Self {
        Self { ports }
    }
}
