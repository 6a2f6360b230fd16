use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wfcore::{ExecutionId, NodeId, RunError, RunState, RunStatus, WorkflowId};

/// Outcome of a run that reached Done or Cancelled
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Persistable summary of one execution.
///
/// The engine never stores it itself; callers hand it to whatever keeps
/// execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_node: Option<NodeId>,
}

impl ExecutionRecord {
    /// Record of a run that aborted with `error`
    pub fn failed(workflow_id: impl Into<WorkflowId>, started_at: DateTime<Utc>, error: RunError) -> Self {
        let failed_node = error.failed_node().map(str::to_string);
        let message = error.error.to_string();
        Self {
            execution_id: error.execution_id,
            workflow_id: workflow_id.into(),
            status: RunStatus::Failed,
            started_at,
            finished_at: Utc::now(),
            state: *error.state,
            error: Some(message),
            failed_node,
        }
    }
}

impl From<ExecutionResult> for ExecutionRecord {
    fn from(result: ExecutionResult) -> Self {
        Self {
            execution_id: result.execution_id,
            workflow_id: result.workflow_id,
            status: result.status,
            started_at: result.started_at,
            finished_at: result.finished_at,
            state: result.state,
            error: None,
            failed_node: None,
        }
    }
}
