use crate::{NodeId, NodeOutput, NodeSpec, PortData, TaskInputs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Terminal (or current) status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Done,
    Cancelled,
    Failed,
}

/// Output port of an upstream node that produced an execution unit's inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub previous_node: NodeId,
    pub previous_output: usize,
}

/// One node together with the inputs it will run on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub node: NodeSpec,
    pub inputs: TaskInputs,
    pub source: Option<Provenance>,
}

impl ExecutionUnit {
    /// Unit with no inputs and no provenance, used for the start node
    pub fn start(node: NodeSpec) -> Self {
        Self {
            node,
            inputs: TaskInputs::new(),
            source: None,
        }
    }
}

/// Mutable record of one workflow execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Latest output of every node that ran, keyed by node id
    pub completed: HashMap<NodeId, NodeOutput>,
    /// Node ids in the order they completed
    pub execution_order: Vec<NodeId>,
    pub last_completed: Option<NodeId>,
    /// Units ready to run; the last one pushed runs first
    pub pending: Vec<ExecutionUnit>,
    /// Partial inputs of join nodes still missing a port
    pub join_buffer: HashMap<NodeId, TaskInputs>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state holding a single unit for the start node
    pub fn starting_at(node: NodeSpec) -> Self {
        let mut state = Self::new();
        state.push(ExecutionUnit::start(node));
        state
    }

    pub fn push(&mut self, unit: ExecutionUnit) {
        self.pending.push(unit);
    }

    pub fn pop(&mut self) -> Option<ExecutionUnit> {
        self.pending.pop()
    }

    pub fn record(&mut self, node_id: &str, output: NodeOutput) {
        self.completed.insert(node_id.to_string(), output);
        self.execution_order.push(node_id.to_string());
        self.last_completed = Some(node_id.to_string());
    }

    /// Add data arriving on one port of a join node.
    ///
    /// Returns the complete inputs, and clears the buffer entry, once every
    /// port in `required` holds data.
    pub fn buffer_join(
        &mut self,
        node_id: &str,
        port: usize,
        data: PortData,
        required: &BTreeSet<usize>,
    ) -> Option<TaskInputs> {
        let entry = self.join_buffer.entry(node_id.to_string()).or_default();
        entry.entry(port).or_default().extend(data);

        let ready = required
            .iter()
            .all(|p| entry.get(p).is_some_and(|items| !items.is_empty()));
        if ready {
            self.join_buffer.remove(node_id)
        } else {
            None
        }
    }

    /// Join nodes left waiting on a port that never received data
    pub fn waiting_nodes(&self) -> Vec<&str> {
        let mut waiting: Vec<&str> = self.join_buffer.keys().map(String::as_str).collect();
        waiting.sort_unstable();
        waiting
    }

    pub fn output(&self, node_id: &str) -> Option<&NodeOutput> {
        self.completed.get(node_id)
    }

    pub fn has_completed(&self, node_id: &str) -> bool {
        self.completed.contains_key(node_id)
    }
}
