use crate::graph::WorkflowGraph;
use crate::registry::NodeRegistry;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use wfcore::{
    EngineError, EventBus, ExecuteContext, ExecutionEvent, ExecutionId, ExecutionUnit, NodeError,
    NodeOutput, NodeType, Provenance, RunError, RunState, RunStatus, TaskInputs,
};

/// Drains the pending stack of one run.
///
/// Units are popped last-in first-out and executed one at a time; a node's
/// non-empty output ports are expanded into new units, with join nodes held
/// back in the run state until every input port they need has data.
pub struct ExecutionDriver<'a> {
    graph: &'a WorkflowGraph,
    registry: &'a NodeRegistry,
    event_bus: &'a EventBus,
    execution_id: ExecutionId,
    cancellation: CancellationToken,
    default_timeout_ms: Option<u64>,
    state: RunState,
}

impl<'a> ExecutionDriver<'a> {
    pub fn new(
        graph: &'a WorkflowGraph,
        registry: &'a NodeRegistry,
        event_bus: &'a EventBus,
        execution_id: ExecutionId,
        state: RunState,
    ) -> Self {
        Self {
            graph,
            registry,
            event_bus,
            execution_id,
            cancellation: CancellationToken::new(),
            default_timeout_ms: None,
            state,
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Timeout applied to nodes that don't set their own
    pub fn with_default_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Run until the stack is empty, cancellation is observed or a node fails.
    ///
    /// A node that errors after cancellation fired counts as cancelled, not failed.
    pub async fn drive(mut self) -> Result<(RunStatus, RunState), RunError> {
        loop {
            if self.cancellation.is_cancelled() {
                tracing::info!(
                    "Execution {} cancelled with {} unit(s) pending",
                    self.execution_id,
                    self.state.pending.len()
                );
                return Ok((RunStatus::Cancelled, self.state));
            }

            let Some(unit) = self.state.pop() else {
                break;
            };
            let node_id = unit.node.id.clone();

            let Some(node_type) = self.registry.resolve(&unit.node.node_type) else {
                let error = EngineError::NodeTypeNotFound {
                    node_id,
                    node_type: unit.node.node_type.clone(),
                };
                return Err(self.fail(error));
            };

            let output = match self.execute_unit(node_type, unit.clone()).await {
                Ok(output) => output,
                Err(_) if self.cancellation.is_cancelled() => {
                    // Interrupted node goes back on the stack, it never completed
                    tracing::info!(
                        "Execution {} cancelled while node {} was running",
                        self.execution_id,
                        node_id
                    );
                    self.state.push(unit);
                    return Ok((RunStatus::Cancelled, self.state));
                }
                Err(source) => {
                    return Err(self.fail(EngineError::NodeExecution { node_id, source }));
                }
            };

            self.schedule_successors(&node_id, &output);
            self.state.record(&node_id, output);
        }

        let waiting = self.state.waiting_nodes();
        if !waiting.is_empty() {
            tracing::debug!("Join node(s) never became ready: {:?}", waiting);
        }

        Ok((RunStatus::Done, self.state))
    }

    async fn execute_unit(
        &self,
        node_type: Arc<dyn NodeType>,
        unit: ExecutionUnit,
    ) -> Result<NodeOutput, NodeError> {
        let ExecutionUnit {
            node,
            inputs,
            source,
        } = unit;

        tracing::debug!("Executing node {} ({})", node.id, node.node_type);
        self.event_bus.emit(ExecutionEvent::NodeStarted {
            execution_id: self.execution_id,
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            timestamp: Utc::now(),
        });

        let ctx = ExecuteContext {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            metadata: node.metadata.clone(),
            inputs,
            source,
            events: self.event_bus.create_emitter(self.execution_id, node.id.clone()),
            cancellation: self.cancellation.child_token(),
        };

        let start = Instant::now();
        let result = match node.timeout_ms.or(self.default_timeout_ms) {
            Some(ms) => match timeout(Duration::from_millis(ms), node_type.execute(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout { ms }),
            },
            None => node_type.execute(ctx).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(output) => {
                tracing::info!("Node {} completed in {}ms", node.id, duration_ms);
                self.event_bus.emit(ExecutionEvent::NodeCompleted {
                    execution_id: self.execution_id,
                    node_id: node.id.clone(),
                    items: output.item_counts(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            Err(e) if self.cancellation.is_cancelled() => {
                tracing::debug!("Node {} stopped by cancellation: {}", node.id, e);
            }
            Err(e) => {
                tracing::error!("Node {} failed: {}", node.id, e);
                self.event_bus.emit(ExecutionEvent::NodeFailed {
                    execution_id: self.execution_id,
                    node_id: node.id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }

        result
    }

    /// Expand every non-empty output port into units for its targets
    fn schedule_successors(&mut self, node_id: &str, output: &NodeOutput) {
        let graph = self.graph;

        for (port, data) in output.ports.iter().enumerate() {
            if data.is_empty() {
                continue;
            }

            for target in graph.targets(node_id, port) {
                let Some(target_node) = graph.node(&target.node_id) else {
                    continue;
                };

                match graph.required_inputs(&target.node_id) {
                    Some(required) if required.len() > 1 => {
                        match self
                            .state
                            .buffer_join(&target.node_id, target.input, data.clone(), required)
                        {
                            Some(inputs) => {
                                tracing::debug!("Join node {} is ready", target.node_id);
                                self.state.push(ExecutionUnit {
                                    node: target_node.clone(),
                                    inputs,
                                    source: None,
                                });
                            }
                            None => self.report_waiting(&target.node_id, required),
                        }
                    }
                    _ => {
                        let mut inputs = TaskInputs::new();
                        inputs.insert(target.input, data.clone());
                        self.state.push(ExecutionUnit {
                            node: target_node.clone(),
                            inputs,
                            source: Some(Provenance {
                                previous_node: node_id.to_string(),
                                previous_output: port,
                            }),
                        });
                    }
                }
            }
        }
    }

    fn report_waiting(&self, node_id: &str, required: &BTreeSet<usize>) {
        let received: Vec<usize> = self
            .state
            .join_buffer
            .get(node_id)
            .map(|ports| ports.keys().copied().collect())
            .unwrap_or_default();

        tracing::debug!(
            "Join node {} waiting: received ports {:?} of {:?}",
            node_id,
            received,
            required
        );
        self.event_bus.emit(ExecutionEvent::NodeWaiting {
            execution_id: self.execution_id,
            node_id: node_id.to_string(),
            received,
            required: required.iter().copied().collect(),
            timestamp: Utc::now(),
        });
    }

    fn fail(self, error: EngineError) -> RunError {
        tracing::error!(
            "Execution {} aborted after {:?}: {}",
            self.execution_id,
            self.state.last_completed,
            error
        );
        RunError::new(self.execution_id, error, self.state)
    }
}
