use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One data item flowing along a connection.
///
/// The payload is opaque to the engine; only node implementations give it
/// meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecuteData {
    pub json: serde_json::Value,
}

/// Ordered items emitted on, or received through, a single port
pub type PortData = Vec<NodeExecuteData>;

/// Accumulated inputs of one invocation, keyed by input port
pub type TaskInputs = BTreeMap<usize, PortData>;

impl NodeExecuteData {
    pub fn new(json: impl Into<serde_json::Value>) -> Self {
        Self { json: json.into() }
    }

    /// Look up a top-level field of an object payload
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.json.get(field)
    }
}

impl From<serde_json::Value> for NodeExecuteData {
    fn from(json: serde_json::Value) -> Self {
        Self { json }
    }
}
