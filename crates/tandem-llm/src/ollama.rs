//! Ollama API client (local runtime)
//!
//! ## API Endpoints
//!
//! | Endpoint | URL | Purpose |
//! |----------|-----|--------|
//! | Local API | `http://localhost:11434` | Local Ollama instance |
//! | Chat | `/api/chat` | Streaming chat completions |
//! | Models | `/api/tags` | List local models |
//!
//! The chat endpoint streams newline-delimited JSON objects. Network reads do
//! not align with line boundaries, so a carry-over buffer reassembles objects
//! split across reads before parsing.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tandem_core::{ChatMessage, ChatRole, Error, Result};

use crate::client::{ChatChunk, ChatChunkStream, ChatOptions, LlmClient, ModelInfo};

/// Ollama API endpoints
pub mod endpoints {
    /// Local API URL (default)
    pub const LOCAL_API: &str = "http://localhost:11434";

    /// Chat endpoint
    /// Full URL: {API}/api/chat
    pub const CHAT: &str = "/api/chat";

    /// Tags/models endpoint
    /// Full URL: {API}/api/tags
    pub const TAGS: &str = "/api/tags";
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<Value>>,
}

impl From<&ChatMessage> for OllamaChatMessage {
    fn from(message: &ChatMessage) -> Self {
        let tool_calls = message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| {
                    serde_json::json!({
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect()
        });

        Self {
            role: match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::System => "system",
                ChatRole::Tool => "tool",
            }
            .to_string(),
            content: message.content.clone(),
            tool_calls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaModelsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    modified_at: Option<String>,
    details: Option<OllamaModelDetails>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelDetails {
    parameter_size: Option<String>,
}

/// Ollama client for a local runtime instance
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for the default local instance
    pub fn local() -> Self {
        Self::with_base_url(endpoints::LOCAL_API)
    }

    /// Create a client with a custom endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(600))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    /// Get the current API URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Parse one NDJSON line from the chat stream.
///
/// Ollama reports failures mid-stream as `{"error": "..."}` lines, which
/// would otherwise deserialize to an empty chunk.
fn parse_stream_line(line: &str) -> Result<ChatChunk> {
    let value: Value = serde_json::from_str(line)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(Error::stream(error.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Vec<Value>,
        options: ChatOptions,
        cancel: CancellationToken,
    ) -> Result<ChatChunkStream> {
        let url = format!("{}{}", self.base_url, endpoints::CHAT);

        info!(model = %model, tools = tools.len(), "Ollama chat stream");

        let request = OllamaChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(OllamaChatMessage::from).collect(),
            tools,
            stream: true,
            options,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::stream(format!("failed to reach Ollama at {url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::stream(format!("Ollama API error {status}: {body}")));
        }

        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf = String::new();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("chat stream cancelled, dropping connection");
                        return;
                    }
                    next = stream.next() => match next {
                        Some(Ok(bytes)) => {
                            buf.push_str(&String::from_utf8_lossy(&bytes));
                            while let Some(pos) = buf.find('\n') {
                                let line = buf[..pos].trim().to_string();
                                buf.drain(..=pos);
                                if line.is_empty() {
                                    continue;
                                }
                                match parse_stream_line(&line) {
                                    Ok(chunk) => {
                                        let done = chunk.done;
                                        if tx.send(Ok(chunk)).await.is_err() {
                                            return;
                                        }
                                        if done {
                                            return;
                                        }
                                    }
                                    Err(e) => {
                                        warn!("bad stream line: {e}");
                                        let _ = tx.send(Err(e)).await;
                                        return;
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let _ = tx
                                .send(Err(Error::stream(format!("failed to read chunk: {e}"))))
                                .await;
                            return;
                        }
                        None => return,
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}{}", self.base_url, endpoints::TAGS);
        debug!(url = %url, "fetching Ollama models");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::stream(format!("failed to reach Ollama at {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::stream(format!(
                "Ollama API error {}",
                response.status()
            )));
        }

        let data: OllamaModelsResponse = response
            .json()
            .await
            .map_err(|e| Error::stream(format!("failed to parse models response: {e}")))?;

        Ok(data
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                parameter_size: m.details.and_then(|d| d.parameter_size),
                modified_at: m.modified_at,
            })
            .collect())
    }
}
