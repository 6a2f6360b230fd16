use crate::{ExecutionDriver, ExecutionResult, NodeRegistry, WorkflowGraph};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use wfcore::{
    EngineError, EventBus, ExecutionEvent, ExecutionId, RunError, RunState, RunStatus, Workflow,
    WorkflowError,
};

/// Entry point for executing workflows.
///
/// Cheap to share: the registry and event bus sit behind `Arc`s, and every
/// call to [`WorkflowEngine::run`] owns a fresh [`RunState`].
pub struct WorkflowEngine {
    registry: Arc<NodeRegistry>,
    event_bus: Arc<EventBus>,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// Create an engine with default settings
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            event_bus,
            config,
        }
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Check the workflow's structure without running it
    pub fn validate(&self, workflow: &Workflow) -> Result<WorkflowGraph, EngineError> {
        WorkflowGraph::build(workflow)
    }

    /// Node types used by the workflow that have no registered implementation
    pub fn missing_node_types(&self, workflow: &Workflow) -> Vec<String> {
        let mut missing: Vec<String> = workflow
            .nodes
            .iter()
            .filter(|n| !self.registry.contains(&n.node_type))
            .map(|n| n.node_type.clone())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Execute a workflow from its start node until it is fully drained
    pub async fn run(&self, workflow: &Workflow) -> Result<ExecutionResult, RunError> {
        self.run_with_cancel(workflow, CancellationToken::new()).await
    }

    /// Execute a workflow, stopping between nodes once `cancellation` fires
    pub async fn run_with_cancel(
        &self,
        workflow: &Workflow,
        cancellation: CancellationToken,
    ) -> Result<ExecutionResult, RunError> {
        let execution_id = ExecutionId::new_v4();
        let started_at = Utc::now();
        let start_time = Instant::now();

        let graph = WorkflowGraph::build(workflow).map_err(|e| {
            tracing::error!("Workflow {} rejected: {}", workflow.id, e);
            RunError::new(execution_id, e, RunState::new())
        })?;

        let start_node = workflow.start_node().cloned().ok_or_else(|| {
            RunError::new(execution_id, WorkflowError::Empty.into(), RunState::new())
        })?;

        tracing::info!(
            "Starting execution {} of workflow {} at node {}",
            execution_id,
            workflow.id,
            start_node.id
        );
        self.event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            workflow_id: workflow.id.clone(),
            start_node: start_node.id.clone(),
            timestamp: started_at,
        });

        let driver = ExecutionDriver::new(
            &graph,
            &self.registry,
            &self.event_bus,
            execution_id,
            RunState::starting_at(start_node),
        )
        .with_cancellation(cancellation)
        .with_default_timeout(self.config.node_timeout_ms);

        let result = driver.drive().await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let status = match &result {
            Ok((status, _)) => *status,
            Err(_) => RunStatus::Failed,
        };
        tracing::info!(
            "Execution {} finished with status {:?} in {}ms",
            execution_id,
            status,
            duration_ms
        );
        self.event_bus.emit(ExecutionEvent::RunFinished {
            execution_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });

        let (status, state) = result?;
        Ok(ExecutionResult {
            execution_id,
            workflow_id: workflow.id.clone(),
            status,
            state,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the execution event channel
    pub event_buffer_size: usize,
    /// Timeout for nodes that don't set `timeout_ms` themselves
    pub node_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            node_timeout_ms: None,
        }
    }
}
