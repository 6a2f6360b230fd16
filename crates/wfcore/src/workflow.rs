use serde::{Deserialize, Serialize};

pub type WorkflowId = String;
pub type NodeId = String;

/// Complete workflow definition, as handed over by the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default, alias = "edges")]
    pub connections: Vec<Connection>,
}

impl Workflow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(
        &mut self,
        source_node: impl Into<String>,
        source_output: usize,
        target_node: impl Into<String>,
        target_input: usize,
    ) {
        self.connections.push(Connection {
            source_node: source_node.into(),
            source_output,
            target_node: target_node.into(),
            target_input,
        });
    }

    /// Node a run starts from: the first trigger, or the first node declared
    pub fn start_node(&self) -> Option<&NodeSpec> {
        self.nodes
            .iter()
            .find(|n| n.role == NodeRole::Trigger)
            .or_else(|| self.nodes.first())
    }
}

/// Whether a node starts a workflow or acts on data it receives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Trigger,
    #[default]
    Action,
}

/// Node specification in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub role: NodeRole,
    #[serde(default)]
    pub name: Option<String>,
    /// Opaque configuration, interpreted only by the node implementation
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Canvas position, never read by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Overrides the engine-wide node timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            role: NodeRole::Action,
            name: None,
            metadata: serde_json::Value::Null,
            position: None,
            timeout_ms: None,
        }
    }

    pub fn trigger(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            role: NodeRole::Trigger,
            ..Self::new(id, node_type)
        }
    }

    /// Set one metadata field, turning the metadata into an object if needed
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Connection from one node's output port to another node's input port.
///
/// Canvas edges (`{ "source": .., "target": .. }`) carry no ports and land on
/// port 0 at both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    #[serde(alias = "source")]
    pub source_node: NodeId,
    #[serde(default)]
    pub source_output: usize,
    #[serde(alias = "target")]
    pub target_node: NodeId,
    #[serde(default)]
    pub target_input: usize,
}

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}
