use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use wfcore::{EngineError, NodeId, NodeSpec, Workflow, WorkflowError};

/// Input port of a downstream node fed by a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub node_id: NodeId,
    pub input: usize,
}

/// Validated, indexed view of a workflow's connections.
///
/// Built once per run; read-only afterwards.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: HashMap<NodeId, NodeSpec>,
    /// node -> output port -> ordered, de-duplicated targets
    targets: HashMap<NodeId, BTreeMap<usize, Vec<Target>>>,
    /// node -> distinct input ports that have at least one connection
    required_inputs: HashMap<NodeId, BTreeSet<usize>>,
}

impl WorkflowGraph {
    /// Validate the workflow and index its connections.
    ///
    /// Rejects empty workflows, duplicate node ids, connections to unknown
    /// nodes and cyclic graphs.
    pub fn build(workflow: &Workflow) -> Result<Self, EngineError> {
        if workflow.nodes.is_empty() {
            return Err(WorkflowError::Empty.into());
        }

        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut node_to_index: HashMap<&str, NodeIndex> = HashMap::new();
        let mut nodes = HashMap::new();

        for node in &workflow.nodes {
            if node_to_index.contains_key(node.id.as_str()) {
                return Err(WorkflowError::DuplicateNode(node.id.clone()).into());
            }
            node_to_index.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
            nodes.insert(node.id.clone(), node.clone());
        }

        let mut targets: HashMap<NodeId, BTreeMap<usize, Vec<Target>>> = HashMap::new();
        let mut required_inputs: HashMap<NodeId, BTreeSet<usize>> = HashMap::new();

        for conn in &workflow.connections {
            let from_idx = node_to_index.get(conn.source_node.as_str()).ok_or_else(|| {
                WorkflowError::UnknownNode {
                    node_id: conn.source_node.clone(),
                    side: "source",
                }
            })?;
            let to_idx = node_to_index.get(conn.target_node.as_str()).ok_or_else(|| {
                WorkflowError::UnknownNode {
                    node_id: conn.target_node.clone(),
                    side: "target",
                }
            })?;
            graph.add_edge(*from_idx, *to_idx, ());

            let port_targets = targets
                .entry(conn.source_node.clone())
                .or_default()
                .entry(conn.source_output)
                .or_default();
            let target = Target {
                node_id: conn.target_node.clone(),
                input: conn.target_input,
            };
            if !port_targets.contains(&target) {
                port_targets.push(target);
            }

            required_inputs
                .entry(conn.target_node.clone())
                .or_default()
                .insert(conn.target_input);
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(EngineError::GraphCycle {
                node_id: graph[cycle.node_id()].to_string(),
            });
        }

        Ok(Self {
            nodes,
            targets,
            required_inputs,
        })
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeSpec> {
        self.nodes.get(node_id)
    }

    /// Targets fed by one output port, in declaration order
    pub fn targets(&self, node_id: &str, output: usize) -> &[Target] {
        self.targets
            .get(node_id)
            .and_then(|ports| ports.get(&output))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Input ports that must all receive data before the node may run
    pub fn required_inputs(&self, node_id: &str) -> Option<&BTreeSet<usize>> {
        self.required_inputs.get(node_id)
    }

    /// Whether the node waits on more than one input port
    pub fn is_join(&self, node_id: &str) -> bool {
        self.required_inputs(node_id)
            .is_some_and(|ports| ports.len() > 1)
    }
}
