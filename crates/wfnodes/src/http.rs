use async_trait::async_trait;
use serde_json::{json, Map, Value};
use wfcore::{ExecuteContext, NodeError, NodeExecuteData, NodeOutput, NodeType};

/// HTTP request node.
///
/// The URL comes from metadata `url`, or from the `url` field of the first
/// input item. For POST and PUT the first input item is sent as JSON body.
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeType for HttpRequestNode {
    fn type_id(&self) -> &str {
        "http.request"
    }

    async fn execute(&self, ctx: ExecuteContext) -> Result<NodeOutput, NodeError> {
        let first = ctx.input_data().first();
        let url = ctx
            .metadata
            .get("url")
            .or_else(|| first.and_then(|item| item.get("url")))
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::InvalidInput {
                field: "url".to_string(),
                expected: "string".to_string(),
            })?;
        let method = ctx
            .metadata
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        ctx.events.info(format!("{} {}", method, url));

        let request = match method.as_str() {
            "GET" => self.client.get(url),
            "DELETE" => self.client.delete(url),
            "POST" | "PUT" => {
                let req = if method == "POST" {
                    self.client.post(url)
                } else {
                    self.client.put(url)
                };
                match first {
                    Some(item) => req.json(&item.json),
                    None => req,
                }
            }
            _ => return Err(NodeError::Configuration(format!("Unsupported method: {}", method))),
        };

        let request = match ctx.metadata.get("headers").and_then(Value::as_object) {
            Some(headers) => headers.iter().fold(request, |req, (key, value)| match value.as_str() {
                Some(v) => req.header(key, v),
                None => req,
            }),
            None => request,
        };

        let response = tokio::select! {
            response = request.send() => response
                .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?,
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        };

        let status = response.status().as_u16();
        let headers = header_map(response.headers());

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;
        let body = serde_json::from_str::<Value>(&body_text).unwrap_or(Value::String(body_text));

        ctx.events.info(format!("Response status: {}", status));

        Ok(NodeOutput::single(vec![NodeExecuteData::new(json!({
            "status": status,
            "headers": headers,
            "body": body,
        }))]))
    }

    fn description(&self) -> &str {
        "Make HTTP requests"
    }

    fn category(&self) -> &str {
        "http"
    }
}

/// Response headers as a JSON object; non UTF-8 bytes are replaced, not dropped
fn header_map(headers: &reqwest::header::HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = String::from_utf8_lossy(v.as_bytes()).into_owned();
            (k.to_string(), Value::String(value))
        })
        .collect()
}
