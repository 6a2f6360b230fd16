use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use wfcore::{
    EngineError, ExecuteContext, ExecutionEvent, NodeError, NodeExecuteData, NodeOutput, NodeSpec,
    NodeType, RunState, RunStatus, Workflow,
};
use wfengine::{EngineConfig, ExecutionRecord, NodeRegistry, WorkflowEngine};

/// Emits metadata `ports` verbatim, or a single item describing the call
struct TestNode;

#[async_trait]
impl NodeType for TestNode {
    fn type_id(&self) -> &str {
        "test.node"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        if let Some(ports) = ctx.metadata.get("ports") {
            let ports: Vec<Vec<Value>> = serde_json::from_value(ports.clone())
                .map_err(|e| NodeError::Configuration(e.to_string()))?;
            let ports: Vec<Vec<NodeExecuteData>> = ports
                .into_iter()
                .map(|items| items.into_iter().map(NodeExecuteData::new).collect())
                .collect();
            return Ok(NodeOutput::from(ports));
        }

        let inputs: serde_json::Map<String, Value> = ctx
            .inputs
            .iter()
            .map(|(port, items)| {
                let items: Vec<Value> = items.iter().map(|i| i.json.clone()).collect();
                (port.to_string(), Value::Array(items))
            })
            .collect();

        Ok(NodeOutput::single(vec![NodeExecuteData::new(json!({
            "node": ctx.node_id,
            "inputs": inputs,
        }))]))
    }
}

struct FailNode;

#[async_trait]
impl NodeType for FailNode {
    fn type_id(&self) -> &str {
        "test.fail"
    }

    async fn execute(&self, _ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

struct SlowNode;

#[async_trait]
impl NodeType for SlowNode {
    fn type_id(&self) -> &str {
        "test.slow"
    }

    async fn execute(&self, _ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        sleep(Duration::from_secs(5)).await;
        Ok(NodeOutput::single(vec![NodeExecuteData::new(json!({}))]))
    }
}

/// Requests cancellation of the run it belongs to
struct CancelNode {
    token: CancellationToken,
}

#[async_trait]
impl NodeType for CancelNode {
    fn type_id(&self) -> &str {
        "test.cancel"
    }

    async fn execute(&self, _ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        self.token.cancel();
        Ok(NodeOutput::single(vec![NodeExecuteData::new(json!({}))]))
    }
}

/// Blocks until the run is cancelled, then reports it like the timer node does
struct WaitNode;

#[async_trait]
impl NodeType for WaitNode {
    fn type_id(&self) -> &str {
        "test.wait"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        ctx.cancellation.cancelled().await;
        Err(NodeError::Cancelled)
    }
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register_node(Arc::new(TestNode));
    registry.register_node(Arc::new(FailNode));
    registry.register_node(Arc::new(SlowNode));
    registry.register_node(Arc::new(WaitNode));
    registry
}

fn cancel_after(token: &CancellationToken, ms: u64) {
    let token = token.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(ms)).await;
        token.cancel();
    });
}

fn round_trip(state: &RunState) -> RunState {
    let json = serde_json::to_string(state).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn engine() -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(registry()))
}

fn linear_chain() -> Workflow {
    let mut wf = Workflow::new("linear");
    wf.add_node(NodeSpec::trigger("a", "test.node"));
    wf.add_node(NodeSpec::new("b", "test.node"));
    wf.add_node(NodeSpec::new("c", "test.node"));
    wf.connect("a", 0, "b", 0);
    wf.connect("b", 0, "c", 0);
    wf
}

/// t feeds d and e, which join into f's two input ports
fn fan_in() -> Workflow {
    let mut wf = Workflow::new("fan-in");
    wf.add_node(NodeSpec::trigger("t", "test.node"));
    wf.add_node(NodeSpec::new("d", "test.node"));
    wf.add_node(NodeSpec::new("e", "test.node"));
    wf.add_node(NodeSpec::new("f", "test.node"));
    wf.connect("t", 0, "d", 0);
    wf.connect("t", 0, "e", 0);
    wf.connect("d", 0, "f", 0);
    wf.connect("e", 0, "f", 1);
    wf
}

fn position(order: &[String], id: &str) -> usize {
    order.iter().position(|n| n == id).unwrap()
}

#[tokio::test]
async fn test_linear_chain_runs_in_dependency_order() {
    let result = engine().run(&linear_chain()).await.unwrap();

    assert_eq!(result.status, RunStatus::Done);
    assert_eq!(result.state.execution_order, vec!["a", "b", "c"]);
    assert_eq!(result.state.completed.len(), 3);
    assert_eq!(result.state.last_completed.as_deref(), Some("c"));
    assert!(result.state.pending.is_empty());

    // c received b's single item on port 0
    let c = &result.state.output("c").unwrap().port(0)[0];
    assert_eq!(c.json["inputs"]["0"][0]["node"], json!("b"));
}

#[tokio::test]
async fn test_fan_out_runs_each_branch_once() {
    let mut wf = Workflow::new("fan-out");
    wf.add_node(NodeSpec::trigger("a", "test.node"));
    wf.add_node(NodeSpec::new("b", "test.node"));
    wf.add_node(NodeSpec::new("c", "test.node"));
    wf.connect("a", 0, "b", 0);
    wf.connect("a", 0, "c", 0);

    let result = engine().run(&wf).await.unwrap();
    let order = &result.state.execution_order;

    assert_eq!(order.len(), 3);
    assert_eq!(order[0], "a");
    assert_eq!(order.iter().filter(|n| *n == "b").count(), 1);
    assert_eq!(order.iter().filter(|n| *n == "c").count(), 1);
}

#[tokio::test]
async fn test_fan_in_waits_for_every_input_port() {
    let result = engine().run(&fan_in()).await.unwrap();
    let order = &result.state.execution_order;

    assert_eq!(order.iter().filter(|n| *n == "f").count(), 1);
    assert!(position(order, "f") > position(order, "d"));
    assert!(position(order, "f") > position(order, "e"));
    assert_eq!(result.state.last_completed.as_deref(), Some("f"));
    assert!(result.state.join_buffer.is_empty());

    let f = &result.state.output("f").unwrap().port(0)[0];
    assert_eq!(f.json["inputs"]["0"][0]["node"], json!("d"));
    assert_eq!(f.json["inputs"]["1"][0]["node"], json!("e"));
}

#[tokio::test]
async fn test_single_port_reconvergence_runs_per_arrival() {
    let mut wf = Workflow::new("diamond");
    wf.add_node(NodeSpec::trigger("a", "test.node"));
    wf.add_node(NodeSpec::new("b", "test.node"));
    wf.add_node(NodeSpec::new("c", "test.node"));
    wf.add_node(NodeSpec::new("d", "test.node"));
    wf.connect("a", 0, "b", 0);
    wf.connect("a", 0, "c", 0);
    wf.connect("b", 0, "d", 0);
    wf.connect("c", 0, "d", 0);

    let result = engine().run(&wf).await.unwrap();

    // d needs only port 0, so each arrival runs it
    assert_eq!(result.state.execution_order, vec!["a", "c", "d", "b", "d"]);
    assert_eq!(result.state.completed.len(), 4);
}

#[tokio::test]
async fn test_cycle_is_rejected_before_execution() {
    let mut wf = Workflow::new("cycle");
    wf.add_node(NodeSpec::trigger("a", "test.node"));
    wf.add_node(NodeSpec::new("b", "test.node"));
    wf.connect("a", 0, "b", 0);
    wf.connect("b", 0, "a", 0);

    let err = engine().run(&wf).await.unwrap_err();

    assert!(matches!(err.error, EngineError::GraphCycle { .. }));
    assert!(err.state.completed.is_empty());
    assert!(err.last_completed().is_none());
}

#[tokio::test]
async fn test_unregistered_node_type_keeps_partial_results() {
    let mut wf = Workflow::new("missing");
    wf.add_node(NodeSpec::trigger("a", "test.node"));
    wf.add_node(NodeSpec::new("b", "market.price"));
    wf.add_node(NodeSpec::new("c", "test.node"));
    wf.connect("a", 0, "b", 0);
    wf.connect("b", 0, "c", 0);

    let err = engine().run(&wf).await.unwrap_err();

    match &err.error {
        EngineError::NodeTypeNotFound { node_id, node_type } => {
            assert_eq!(node_id, "b");
            assert_eq!(node_type, "market.price");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.failed_node(), Some("b"));
    assert_eq!(err.last_completed(), Some("a"));
    assert!(err.state.has_completed("a"));
    assert!(!err.state.has_completed("c"));
}

#[tokio::test]
async fn test_empty_trigger_port_leaves_join_unfired() {
    let mut wf = Workflow::new("conditional");
    wf.add_node(
        NodeSpec::trigger("t", "test.node").with_metadata("ports", json!([[{ "x": 1 }], []])),
    );
    wf.add_node(NodeSpec::new("d", "test.node"));
    wf.add_node(NodeSpec::new("f", "test.node"));
    wf.connect("t", 0, "d", 0);
    wf.connect("t", 1, "f", 1);
    wf.connect("d", 0, "f", 0);

    let result = engine().run(&wf).await.unwrap();

    assert_eq!(result.status, RunStatus::Done);
    assert_eq!(result.state.execution_order, vec!["t", "d"]);
    assert!(!result.state.has_completed("f"));
    assert_eq!(result.state.waiting_nodes(), vec!["f"]);

    // Buffered join input is part of the persisted state
    let restored = round_trip(&result.state);
    assert_eq!(restored, result.state);
    assert_eq!(restored.waiting_nodes(), vec!["f"]);
}

#[tokio::test]
async fn test_rerun_is_deterministic() {
    let engine = engine();
    let wf = fan_in();

    let first = engine.run(&wf).await.unwrap();
    let second = engine.run(&wf).await.unwrap();

    assert_ne!(first.execution_id, second.execution_id);
    assert_eq!(first.state.completed, second.state.completed);
    assert_eq!(first.state.execution_order, second.state.execution_order);
    assert_eq!(first.state.last_completed, second.state.last_completed);
}

#[tokio::test]
async fn test_node_failure_aborts_run() {
    let mut wf = linear_chain();
    wf.nodes[1] = NodeSpec::new("b", "test.fail");

    let err = engine().run(&wf).await.unwrap_err();

    match &err.error {
        EngineError::NodeExecution { node_id, source } => {
            assert_eq!(node_id, "b");
            assert_eq!(source, &NodeError::ExecutionFailed("boom".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.last_completed(), Some("a"));
    assert_eq!(err.state.execution_order, vec!["a"]);
}

#[tokio::test]
async fn test_node_timeout_is_a_failure() {
    let mut wf = linear_chain();
    wf.nodes[1] = NodeSpec::new("b", "test.slow").with_timeout(20);

    let err = engine().run(&wf).await.unwrap_err();

    assert!(matches!(
        err.error,
        EngineError::NodeExecution { ref node_id, source: NodeError::Timeout { ms: 20 } } if node_id == "b"
    ));
    assert!(!err.state.has_completed("c"));
}

#[tokio::test]
async fn test_engine_default_timeout_applies() {
    let config = EngineConfig {
        node_timeout_ms: Some(20),
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::with_config(Arc::new(registry()), config);

    let mut wf = Workflow::new("slow");
    wf.add_node(NodeSpec::trigger("s", "test.slow"));

    let err = engine.run(&wf).await.unwrap_err();
    assert!(matches!(
        err.error,
        EngineError::NodeExecution { source: NodeError::Timeout { ms: 20 }, .. }
    ));
}

#[tokio::test]
async fn test_cancellation_stops_before_next_unit() {
    let token = CancellationToken::new();
    let mut registry = registry();
    registry.register_node(Arc::new(CancelNode { token: token.clone() }));
    let engine = WorkflowEngine::new(Arc::new(registry));

    let mut wf = linear_chain();
    wf.nodes[1] = NodeSpec::new("b", "test.cancel");

    let result = engine.run_with_cancel(&wf, token).await.unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.state.execution_order, vec!["a", "b"]);
    assert!(!result.state.has_completed("c"));
    assert_eq!(result.state.pending.len(), 1);
}

#[tokio::test]
async fn test_cancellation_while_node_runs_is_not_a_failure() {
    let engine = engine();
    let mut events = engine.subscribe_events();

    let mut wf = linear_chain();
    wf.nodes[1] = NodeSpec::new("b", "test.wait");

    let token = CancellationToken::new();
    cancel_after(&token, 50);
    let result = engine.run_with_cancel(&wf, token).await.unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.state.execution_order, vec!["a"]);
    assert!(!result.state.has_completed("b"));
    assert!(!result.state.has_completed("c"));
    assert_eq!(result.state.pending.len(), 1);
    assert_eq!(result.state.pending[0].node.id, "b");
    assert!(result.finished_at >= result.started_at);
    assert!(result.duration_ms() >= 40);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(!seen.iter().any(|e| matches!(e, ExecutionEvent::NodeFailed { .. })));
    assert!(matches!(
        seen.last(),
        Some(ExecutionEvent::RunFinished { status: RunStatus::Cancelled, .. })
    ));
}

#[tokio::test]
async fn test_cancelled_state_survives_serialization() {
    let mut wf = linear_chain();
    wf.nodes[1] = NodeSpec::new("b", "test.wait");

    let token = CancellationToken::new();
    cancel_after(&token, 20);
    let result = engine().run_with_cancel(&wf, token).await.unwrap();
    assert!(!result.state.pending.is_empty());

    assert_eq!(round_trip(&result.state), result.state);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let token = CancellationToken::new();
    token.cancel();

    let result = engine().run_with_cancel(&linear_chain(), token).await.unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.state.completed.is_empty());
}

#[tokio::test]
async fn test_start_node_falls_back_to_first_declared() {
    let mut wf = Workflow::new("no-trigger");
    wf.add_node(NodeSpec::new("x", "test.node"));
    wf.add_node(NodeSpec::new("y", "test.node"));
    wf.connect("x", 0, "y", 0);

    let result = engine().run(&wf).await.unwrap();
    assert_eq!(result.state.execution_order, vec!["x", "y"]);
}

#[tokio::test]
async fn test_events_trace_the_run() {
    let engine = engine();
    let mut events = engine.subscribe_events();

    engine.run(&fan_in()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(matches!(seen.first(), Some(ExecutionEvent::RunStarted { start_node, .. }) if start_node == "t"));
    assert!(matches!(
        seen.last(),
        Some(ExecutionEvent::RunFinished { status: RunStatus::Done, .. })
    ));
    assert!(seen
        .iter()
        .any(|e| matches!(e, ExecutionEvent::NodeWaiting { node_id, .. } if node_id == "f")));
    let completed = seen
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::NodeCompleted { .. }))
        .count();
    assert_eq!(completed, 4);
}

#[tokio::test]
async fn test_failed_run_produces_execution_record() {
    let mut wf = linear_chain();
    wf.nodes[2] = NodeSpec::new("c", "test.fail");
    let started_at = chrono::Utc::now();

    let err = engine().run(&wf).await.unwrap_err();
    let record = ExecutionRecord::failed(wf.id.clone(), started_at, err);

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.failed_node.as_deref(), Some("c"));
    assert_eq!(record.state.last_completed.as_deref(), Some("b"));
    assert!(record.error.unwrap().contains("boom"));
}

#[test]
fn test_missing_node_types_are_listed_once() {
    let mut wf = Workflow::new("wf");
    wf.add_node(NodeSpec::trigger("a", "test.node"));
    wf.add_node(NodeSpec::new("b", "exchange.order"));
    wf.add_node(NodeSpec::new("c", "exchange.order"));

    assert_eq!(engine().missing_node_types(&wf), vec!["exchange.order"]);
}

#[tokio::test]
async fn test_execution_record_survives_serialization() {
    let result = engine().run(&fan_in()).await.unwrap();
    let record = ExecutionRecord::from(result.clone());

    let json = serde_json::to_value(&record).unwrap();
    assert!(json.get("error").is_none());
    let restored: ExecutionRecord = serde_json::from_value(json).unwrap();

    assert_eq!(restored.execution_id, result.execution_id);
    assert_eq!(restored.workflow_id, "fan-in");
    assert_eq!(restored.status, RunStatus::Done);
    assert_eq!(restored.started_at, result.started_at);
    assert_eq!(restored.finished_at, result.finished_at);
    assert_eq!(restored.state, result.state);
    assert_eq!(restored.error, None);
    assert_eq!(restored.failed_node, None);

    let mut wf = linear_chain();
    wf.nodes[2] = NodeSpec::new("c", "test.fail");
    let err = engine().run(&wf).await.unwrap_err();
    let failed = ExecutionRecord::failed(wf.id.clone(), chrono::Utc::now(), err);

    let json = serde_json::to_string(&failed).unwrap();
    let restored: ExecutionRecord = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.execution_id, failed.execution_id);
    assert_eq!(restored.status, RunStatus::Failed);
    assert_eq!(restored.state, failed.state);
    assert_eq!(restored.error, failed.error);
    assert_eq!(restored.failed_node.as_deref(), Some("c"));
}
