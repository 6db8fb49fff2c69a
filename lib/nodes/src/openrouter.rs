//! The OPENROUTER_NODE: text generation through an OpenAI-compatible chat
//! completions API.
//!
//! Configuration: `variableName`, `credentialId`, `model`, and optional
//! `systemPrompt` and `userPrompt` templates. The credential's secret is
//! sent as the bearer token. Output under `variableName` is
//! `{ "aiResponse": "<text>" }`.

use crate::credential::CredentialStore;
use crate::http::{request_error, status_error};
use async_trait::async_trait;
use nodeflow_core::CredentialId;
use nodeflow_workflow::{
    ExecutionContext, NodeError, NodeExecutor, NodeInvocation, TemplateResolver, step_fn,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{debug, instrument};

const STEP_NAME: &str = "openrouter-generate-text";

/// Output token limit of every request.
pub const MAX_TOKENS: u32 = 200;

/// Base URL of the OpenRouter API.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration of the OpenRouter executor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenRouterConfig {
    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Executor for OPENROUTER_NODE nodes.
pub struct OpenRouterExecutor {
    client: Client,
    credentials: Arc<dyn CredentialStore>,
    endpoint: String,
    templates: TemplateResolver,
}

impl OpenRouterExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(client: Client, credentials: Arc<dyn CredentialStore>, config: &OpenRouterConfig) -> Self {
        Self {
            client,
            credentials,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            templates: TemplateResolver::new(),
        }
    }

    fn render(&self, invocation: &NodeInvocation<'_>, field: &str) -> Result<String, NodeError> {
        let source = invocation.optional_str(field).unwrap_or_default();
        self.templates
            .render(source, invocation.context)
            .map_err(|e| NodeError::validation(format!("{field}: {e}")))
    }
}

#[async_trait]
impl NodeExecutor for OpenRouterExecutor {
    #[instrument(skip_all, fields(node_id = %invocation.node_id()))]
    async fn execute(&self, invocation: NodeInvocation<'_>) -> Result<ExecutionContext, NodeError> {
        invocation
            .run_with_status(|| async {
                let variable_name = invocation.require_str("variableName")?;
                let credential_id: CredentialId = invocation
                    .require_str("credentialId")?
                    .parse()
                    .map_err(|e| NodeError::validation(format!("credentialId: {e}")))?;
                let model = invocation.require_str("model")?;

                let request = ChatRequest::new(
                    model,
                    &self.render(&invocation, "systemPrompt")?,
                    &self.render(&invocation, "userPrompt")?,
                );
                debug!(model, "Requesting chat completion");

                let call = GenerateCall {
                    client: &self.client,
                    credentials: self.credentials.as_ref(),
                    endpoint: &self.endpoint,
                    credential_id,
                    request: &request,
                };
                let text = invocation
                    .steps
                    .run(STEP_NAME, step_fn(move || call.generate()))
                    .await?;

                Ok(invocation
                    .context
                    .with_output(variable_name, json!({ "aiResponse": text })))
            })
            .await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

impl ChatRequest {
    fn new(model: &str, system: &str, user: &str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user.to_string(),
        });
        Self {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            messages,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone, Copy)]
struct GenerateCall<'a> {
    client: &'a Client,
    credentials: &'a dyn CredentialStore,
    endpoint: &'a str,
    credential_id: CredentialId,
    request: &'a ChatRequest,
}

impl GenerateCall<'_> {
    async fn generate(self) -> Result<JsonValue, NodeError> {
        let api_key = self.credentials.secret(self.credential_id).await?;

        let response = self
            .client
            .post(self.endpoint)
            .bearer_auth(api_key)
            .json(self.request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| NodeError::internal(format!("malformed chat completion: {e}")))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(JsonValue::String(text))
    }
}
