//! OpenAI-compatible gateway.
//!
//! Talks to `POST {base_url}/chat/completions` and understands the three
//! response shapes: a plain message, a server-sent-event stream of deltas,
//! and a forced tool (function) call.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::trait_def::ModelGateway;
use super::types::{ChatRequest, FragmentStream, FunctionSchema, GatewayError};

/// Gateway for OpenAI and any server that speaks its chat-completions API.
#[derive(Clone)]
pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .finish()
    }
}

impl OpenAiGateway {
    /// Base URL of the hosted OpenAI API.
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

    /// Create a gateway against the hosted OpenAI API.
    ///
    /// An empty `api_key` is accepted; the first request will then fail
    /// with an authentication error from the service.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL)
    }

    /// Create a gateway against a custom OpenAI-compatible endpoint.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("blueprint/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// POST a request body and fail on any non-success status.
    async fn post(&self, body: &Value) -> Result<reqwest::Response, GatewayError> {
        let mut req = self.client.post(self.endpoint()).json(body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(status = status.as_u16(), error = %e, "failed to read error body");
                    String::new()
                }
            };
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

fn base_body(request: &ChatRequest) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(request.model));
    body.insert("temperature".to_string(), json!(request.temperature));
    body.insert("messages".to_string(), json!(request.messages));
    body
}

fn function_body(request: &ChatRequest, schema: &FunctionSchema) -> Value {
    let mut body = base_body(request);
    body.insert(
        "tools".to_string(),
        json!([{ "type": "function", "function": schema }]),
    );
    body.insert(
        "tool_choice".to_string(),
        json!({ "type": "function", "function": { "name": schema.name } }),
    );
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn first_message(v: &Value) -> Result<&Value, GatewayError> {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| GatewayError::Decode("response has no choices[0].message".to_string()))
}

/// Extract `choices[0].message.content` from a non-streaming response.
fn message_content(v: &Value) -> Result<String, GatewayError> {
    first_message(v)?
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Decode("message has no text content".to_string()))
}

/// Extract the forced call's JSON arguments.
///
/// Prefers `tool_calls[0].function.arguments` and falls back to the legacy
/// `function_call.arguments` shape.
fn function_arguments(v: &Value) -> Result<Option<String>, GatewayError> {
    let message = first_message(v)?;

    let from_tools = message
        .get("tool_calls")
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("function"))
        .and_then(|f| f.get("arguments"))
        .and_then(|a| a.as_str());
    let legacy = message
        .get("function_call")
        .and_then(|f| f.get("arguments"))
        .and_then(|a| a.as_str());

    Ok(from_tools.or(legacy).map(str::to_string))
}

/// One parsed line of a server-sent-event stream.
#[derive(Debug, PartialEq)]
enum SseLine {
    /// A non-empty content delta.
    Fragment(String),
    /// The `[DONE]` terminator.
    Done,
    /// Comments, keep-alives, role-only deltas, malformed chunks.
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseLine, GatewayError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!(line = data, error = %e, "skipping malformed stream chunk");
            return Ok(SseLine::Skip);
        }
    };

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(GatewayError::Decode(format!("error in stream: {message}")));
    }

    match v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
    {
        Some(text) if !text.is_empty() => Ok(SseLine::Fragment(text.to_string())),
        _ => Ok(SseLine::Skip),
    }
}

// ---------------------------------------------------------------------------
// ModelGateway implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        debug!(model = %request.model, messages = request.messages.len(), "chat completion");
        let body = Value::Object(base_body(request));
        let v: Value = self.post(&body).await?.json().await?;
        message_content(&v)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, GatewayError> {
        debug!(model = %request.model, messages = request.messages.len(), "streaming chat completion");
        let mut body = base_body(request);
        body.insert("stream".to_string(), json!(true));
        let response = self.post(&Value::Object(body)).await?;

        let mut bytes = Box::pin(response.bytes_stream());

        // Lines are split on raw bytes so multi-byte characters that straddle
        // chunk boundaries are decoded whole.
        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;

            while !finished {
                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        yield Err(GatewayError::Http(e));
                        return;
                    }
                    None => {
                        finished = true;
                        buffer.push(b'\n');
                    }
                }

                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_sse_line(line) {
                        Ok(SseLine::Fragment(text)) => yield Ok(text),
                        Ok(SseLine::Done) => return,
                        Ok(SseLine::Skip) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn call_function(
        &self,
        request: &ChatRequest,
        schema: &FunctionSchema,
    ) -> Result<Option<String>, GatewayError> {
        debug!(model = %request.model, function = %schema.name, "forced function call");
        let body = function_body(request, schema);
        let v: Value = self.post(&body).await?.json().await?;
        function_arguments(&v)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
