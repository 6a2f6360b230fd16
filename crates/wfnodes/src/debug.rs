use async_trait::async_trait;
use wfcore::{ExecuteContext, NodeError, NodeOutput, NodeType};

/// Logs every item it receives and passes them through unchanged
pub struct DebugNode;

#[async_trait]
impl NodeType for DebugNode {
    fn type_id(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let label = ctx
            .metadata
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or(ctx.node_id.as_str());
        let items = ctx.input_data();

        if items.is_empty() {
            ctx.events.warn(format!("DEBUG [{}]: no input", label));
        }
        for item in items {
            tracing::info!("[{}] {}", label, item.json);
            ctx.events.info(format!("DEBUG [{}]: {}", label, item.json));
        }

        Ok(NodeOutput::single(items.to_vec()))
    }

    fn description(&self) -> &str {
        "Logs input items for debugging"
    }

    fn category(&self) -> &str {
        "debug"
    }
}
