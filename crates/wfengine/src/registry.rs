use std::collections::HashMap;
use std::sync::Arc;
use wfcore::NodeType;

/// Description of a registered node type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypeInfo {
    pub type_id: String,
    pub description: String,
    pub category: String,
}

/// Registry of available node types.
///
/// Populated during setup, then shared read-only (behind an `Arc`) by every
/// run.
pub struct NodeRegistry {
    node_types: HashMap<String, Arc<dyn NodeType>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            node_types: HashMap::new(),
        }
    }

    /// Bind an implementation to `type_id`, replacing any previous binding
    pub fn register(&mut self, type_id: impl Into<String>, node_type: Arc<dyn NodeType>) {
        let type_id = type_id.into();
        tracing::debug!("Registering node type: {}", type_id);
        if self.node_types.insert(type_id.clone(), node_type).is_some() {
            tracing::warn!("Node type {} was already registered, replacing it", type_id);
        }
    }

    /// Register an implementation under its own type id
    pub fn register_node(&mut self, node_type: Arc<dyn NodeType>) {
        let type_id = node_type.type_id().to_string();
        self.register(type_id, node_type);
    }

    pub fn resolve(&self, type_id: &str) -> Option<Arc<dyn NodeType>> {
        self.node_types.get(type_id).cloned()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.node_types.contains_key(type_id)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.node_types.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn describe(&self, type_id: &str) -> Option<NodeTypeInfo> {
        self.node_types.get(type_id).map(|node| NodeTypeInfo {
            type_id: type_id.to_string(),
            description: node.description().to_string(),
            category: node.category().to_string(),
        })
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
