use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};
use wfcore::{ExecuteContext, NodeError, NodeExecuteData, NodeOutput, NodeType};

/// Starts a workflow with the items configured in its `payload`
pub struct ManualTrigger;

#[async_trait]
impl NodeType for ManualTrigger {
    fn type_id(&self) -> &str {
        "trigger.manual"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let items = match ctx.metadata_or("payload", json!({})) {
            Value::Array(values) => values.into_iter().map(NodeExecuteData::new).collect(),
            value => vec![NodeExecuteData::new(value)],
        };

        Ok(NodeOutput::single(items))
    }

    fn description(&self) -> &str {
        "Start a workflow with a fixed payload"
    }

    fn category(&self) -> &str {
        "trigger"
    }
}

/// Waits `time` seconds, then emits a single tick item
pub struct TimerTrigger;

#[async_trait]
impl NodeType for TimerTrigger {
    fn type_id(&self) -> &str {
        "trigger.timer"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let seconds = match ctx.metadata.get("time") {
            None => 0.0,
            Some(v) => v
                .as_f64()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| {
                    NodeError::Configuration(format!("'time' must be a non-negative number, got {}", v))
                })?,
        };

        if seconds > 0.0 {
            ctx.events.info(format!("Waiting {}s", seconds));
            tokio::select! {
                _ = sleep(Duration::from_secs_f64(seconds)) => {}
                _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            }
        }

        Ok(NodeOutput::single(vec![NodeExecuteData::new(json!({
            "fired_at": Utc::now().to_rfc3339(),
            "waited_secs": seconds,
        }))]))
    }

    fn description(&self) -> &str {
        "Run after waiting a number of seconds"
    }

    fn category(&self) -> &str {
        "trigger"
    }
}
