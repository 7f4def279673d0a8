//! OpenAI-compatible wire types and the HTTP client that speaks them.
//!
//! Only the three endpoints this application needs are covered:
//! `GET /models` (credential probe), `POST /chat/completions`, and
//! `POST /images/generations`.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::credential::Credential;
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
    Tool,
}

impl WireRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WireRole::System => "system",
            WireRole::User => "user",
            WireRole::Assistant => "assistant",
            WireRole::Tool => "tool",
        }
    }
}

/// A chat message as the provider sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: WireRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(WireRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(WireRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(WireRole::Assistant, content)
    }

    /// Result of a tool call, answered back to the model.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: WireRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Non-empty text content, if any.
    pub fn content_text(&self) -> Option<&str> {
        self.content.as_deref().filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

impl ToolCall {
    pub fn parse_arguments<T: DeserializeOwned>(&self) -> Result<T, ChatError> {
        serde_json::from_str(&self.function.arguments).map_err(|e| {
            ChatError::malformed(format!(
                "arguments for {} are not valid: {}",
                self.function.name, e
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &'static str, description: &'static str, parameters: Value) -> Self {
        Self {
            kind: "function",
            function: FunctionDefinition {
                name,
                description,
                parameters,
            },
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: &str, messages: Vec<WireMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            messages,
            tools: None,
            tool_choice: None,
            max_tokens,
            temperature,
        }
    }

    /// Offers `tools` and leaves the choice to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self.tool_choice = Some("auto");
        self
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

/// Request body for `POST /images/generations`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    pub quality: &'static str,
    pub response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Thin client over the provider's REST API.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    api_base: String,
}

impl ProviderClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Read-only probe used to check whether `api_key` is accepted.
    #[instrument(skip_all)]
    pub async fn list_models(&self, api_key: &str) -> Result<(), ChatError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(api_key)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(upstream_error(response).await)
        }
    }

    /// Sends one completion and returns the first choice's message.
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len()))]
    pub async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<WireMessage, ChatError> {
        let response: CompletionResponse = self
            .post_json("chat/completions", credential, request)
            .await?;
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ChatError::malformed("completion response has no choices"))?;
        debug!(
            tool_calls = message.tool_calls().len(),
            has_content = message.content_text().is_some(),
            "Received completion"
        );
        Ok(message)
    }

    /// Requests an image and returns its URL, if the provider sent one.
    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn create_image(
        &self,
        credential: &Credential,
        request: &ImageRequest,
    ) -> Result<Option<String>, ChatError> {
        let response: ImageResponse = self
            .post_json("images/generations", credential, request)
            .await?;
        Ok(response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .filter(|url| !url.is_empty()))
    }

    async fn post_json<B, R>(&self, path: &str, credential: &Credential, body: &B) -> Result<R, ChatError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ChatError::malformed(format!("failed to parse {} response: {}", path, e)))
    }
}

/// Builds an `Upstream` error, preferring the provider's own error message.
async fn upstream_error(response: Response) -> ChatError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
    error!(%status, %message, "Provider request failed");
    ChatError::Upstream {
        status: status.as_u16(),
        message,
    }
}
