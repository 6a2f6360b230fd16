use async_trait::async_trait;
use serde_json::{Map, Value};
use wfcore::{ExecuteContext, NodeError, NodeExecuteData, NodeOutput, NodeType};

/// Merges the configured `fields` into every input item
pub struct SetNode;

#[async_trait]
impl NodeType for SetNode {
    fn type_id(&self) -> &str {
        "transform.set"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let fields = ctx
            .require_metadata("fields")?
            .as_object()
            .ok_or_else(|| NodeError::Configuration("'fields' must be an object".to_string()))?;

        let items = ctx
            .input_data()
            .iter()
            .map(|item| {
                // Non-object payloads are kept under "value"
                let mut object = match &item.json {
                    Value::Object(map) => map.clone(),
                    other => {
                        let mut map = Map::new();
                        map.insert("value".to_string(), other.clone());
                        map
                    }
                };
                for (key, value) in fields {
                    object.insert(key.clone(), value.clone());
                }
                NodeExecuteData::new(Value::Object(object))
            })
            .collect();

        Ok(NodeOutput::single(items))
    }

    fn description(&self) -> &str {
        "Set fields on every item"
    }

    fn category(&self) -> &str {
        "transform"
    }
}
