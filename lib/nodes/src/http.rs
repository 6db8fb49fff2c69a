//! The HTTP_REQUEST node.
//!
//! Configuration: `variableName`, `endpoint`, `method` (default GET) and an
//! optional `body`. `endpoint` and `body` may contain templates. The body is
//! sent only for POST, PUT and PATCH, as `application/json`.
//!
//! Output under `variableName`:
//!
//! ```json
//! { "httpResponse": { "status": 200, "statusText": "OK", "body": ... } }
//! ```

use async_trait::async_trait;
use nodeflow_workflow::{
    ExecutionContext, NodeError, NodeExecutor, NodeInvocation, TemplateResolver, step_fn,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, instrument};

const STEP_NAME: &str = "http-request";

/// Executor for HTTP_REQUEST nodes.
#[derive(Debug)]
pub struct HttpRequestExecutor {
    client: Client,
    templates: TemplateResolver,
}

impl HttpRequestExecutor {
    /// Creates an executor sending requests with `client`.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            templates: TemplateResolver::new(),
        }
    }

    fn render(&self, source: &str, context: &ExecutionContext) -> Result<String, NodeError> {
        self.templates
            .render(source, context)
            .map_err(|e| NodeError::validation(e.to_string()))
    }

    fn render_value(&self, value: &JsonValue, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        Ok(match value {
            JsonValue::String(s) => JsonValue::String(self.render(s, context)?),
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|v| self.render_value(v, context))
                    .collect::<Result<_, _>>()?,
            ),
            JsonValue::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.render_value(v, context)?)))
                    .collect::<Result<Map<_, _>, NodeError>>()?,
            ),
            other => other.clone(),
        })
    }

    fn build_call(&self, invocation: &NodeInvocation<'_>) -> Result<HttpCall, NodeError> {
        let endpoint = invocation.require_str("endpoint")?;
        let method = parse_method(invocation.optional_str("method").unwrap_or("GET"))?;
        let url = self.render(endpoint, invocation.context)?;

        let body = match invocation.data().get("body") {
            Some(body) if sends_body(&method) => match body {
                JsonValue::Null => None,
                JsonValue::String(s) if s.trim().is_empty() => None,
                JsonValue::String(s) => Some(self.render(s, invocation.context)?),
                other => Some(self.render_value(other, invocation.context)?.to_string()),
            },
            _ => None,
        };

        Ok(HttpCall { method, url, body })
    }
}

#[async_trait]
impl NodeExecutor for HttpRequestExecutor {
    #[instrument(skip_all, fields(node_id = %invocation.node_id()))]
    async fn execute(&self, invocation: NodeInvocation<'_>) -> Result<ExecutionContext, NodeError> {
        invocation
            .run_with_status(|| async {
                let variable_name = invocation.require_str("variableName")?;
                let call = self.build_call(&invocation)?;
                debug!(method = %call.method, url = %call.url, "Sending HTTP request");

                let client = &self.client;
                let call = &call;
                let output = invocation
                    .steps
                    .run(STEP_NAME, step_fn(move || send(client, call)))
                    .await?;

                Ok(invocation.context.with_output(variable_name, output))
            })
            .await
    }
}

struct HttpCall {
    method: Method,
    url: String,
    body: Option<String>,
}

async fn send(client: &Client, call: &HttpCall) -> Result<JsonValue, NodeError> {
    let mut request = client.request(call.method.clone(), &call.url);
    if let Some(body) = &call.body {
        request = request
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone());
    }

    let response = request.send().await.map_err(request_error)?;
    let status = response.status();
    let body = read_body(response).await?;

    if !status.is_success() {
        return Err(status_error(status, &body.to_string()));
    }

    Ok(json!({
        "httpResponse": {
            "status": status.as_u16(),
            "statusText": status.canonical_reason().unwrap_or_default(),
            "body": body,
        }
    }))
}

async fn read_body(response: Response) -> Result<JsonValue, NodeError> {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    let text = response
        .text()
        .await
        .map_err(|e| NodeError::transient(format!("failed to read response body: {e}")))?;

    if is_json {
        Ok(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)))
    } else {
        Ok(JsonValue::String(text))
    }
}

/// Classifies a failure to obtain a response.
pub(crate) fn request_error(e: reqwest::Error) -> NodeError {
    if e.is_builder() {
        NodeError::validation(format!("invalid request: {e}"))
    } else {
        NodeError::transient(format!("request failed: {e}"))
    }
}

/// Classifies an unsuccessful response status.
///
/// 408, 429 and 5xx are transient; every other status is internal.
pub(crate) fn status_error(status: StatusCode, body: &str) -> NodeError {
    let excerpt: String = body.chars().take(200).collect();
    let message = format!("upstream responded {status}: {excerpt}");
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        NodeError::transient(message)
    } else {
        NodeError::internal(message)
    }
}

fn parse_method(method: &str) -> Result<Method, NodeError> {
    match method.trim().to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(NodeError::validation(format!(
            "unsupported HTTP method: {other}"
        ))),
    }
}

fn sends_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}
