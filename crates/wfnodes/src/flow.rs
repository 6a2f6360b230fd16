use async_trait::async_trait;
use serde_json::Value;
use wfcore::{ExecuteContext, NodeError, NodeOutput, NodeType, PortData};

/// Routes each item to port 0 when its `field` satisfies the condition,
/// otherwise to port 1.
///
/// Metadata: `field`, `op` (`eq`, `ne`, `gt`, `gte`, `lt`, `lte`, `exists`;
/// defaults to `eq`) and `value`.
pub struct IfNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
}

impl Op {
    fn parse(s: &str) -> Result<Self, NodeError> {
        match s {
            "eq" => Ok(Op::Eq),
            "ne" => Ok(Op::Ne),
            "gt" => Ok(Op::Gt),
            "gte" => Ok(Op::Gte),
            "lt" => Ok(Op::Lt),
            "lte" => Ok(Op::Lte),
            "exists" => Ok(Op::Exists),
            other => Err(NodeError::Configuration(format!("Unsupported op: {}", other))),
        }
    }

    fn matches(self, actual: Option<&Value>, expected: &Value) -> bool {
        match self {
            Op::Exists => actual.is_some_and(|v| !v.is_null()),
            Op::Eq => actual == Some(expected),
            Op::Ne => actual != Some(expected),
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                let (Some(a), Some(b)) = (actual.and_then(Value::as_f64), expected.as_f64()) else {
                    return false;
                };
                match self {
                    Op::Gt => a > b,
                    Op::Gte => a >= b,
                    Op::Lt => a < b,
                    _ => a <= b,
                }
            }
        }
    }
}

#[async_trait]
impl NodeType for IfNode {
    fn type_id(&self) -> &str {
        "flow.if"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let field = ctx
            .require_metadata("field")?
            .as_str()
            .ok_or_else(|| NodeError::Configuration("'field' must be a string".to_string()))?;
        let op = match ctx.metadata.get("op").and_then(Value::as_str) {
            Some(op) => Op::parse(op)?,
            None => Op::Eq,
        };
        let expected = ctx.metadata_or("value", Value::Null);

        let (matched, rest): (PortData, PortData) = ctx
            .input_data()
            .iter()
            .cloned()
            .partition(|item| op.matches(item.get(field), &expected));

        ctx.events.info(format!("{} matched, {} not matched", matched.len(), rest.len()));

        Ok(NodeOutput::new().with_port(matched).with_port(rest))
    }

    fn description(&self) -> &str {
        "Route items by comparing a field"
    }

    fn category(&self) -> &str {
        "flow"
    }
}

/// Waits for every connected input port, then emits all items on port 0
/// in port order
pub struct MergeNode;

#[async_trait]
impl NodeType for MergeNode {
    fn type_id(&self) -> &str {
        "flow.merge"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let items: PortData = ctx.inputs.into_values().flatten().collect();
        Ok(NodeOutput::single(items))
    }

    fn description(&self) -> &str {
        "Combine the items of all input ports"
    }

    fn category(&self) -> &str {
        "flow"
    }
}
