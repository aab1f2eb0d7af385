//! Shared mocks for the orchestration integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use tandem_chat::{AbortHandle, ChatConfig, ChatStore, InMemoryApi};
use tandem_core::{ChatMessage, Error, Result, ToolDefinition};
use tandem_llm::{
    ChatChunk, ChatChunkStream, ChatOptions, ChunkMessage, FunctionCall, LlmClient, ModelInfo,
    ToolCallFragment,
};
use tandem_tools::ToolConnections;

/// One scripted step of a mock chat stream
pub enum Step {
    Chunk(ChatChunk),
    /// Park until the test releases the gate
    Gate(Arc<Notify>),
    /// Trigger cancellation from inside the stream
    Cancel(AbortHandle),
    /// Fail the stream with a transport error
    Fail(String),
}

pub fn content(text: &str) -> Step {
    Step::Chunk(ChatChunk {
        message: Some(ChunkMessage {
            content: text.to_string(),
            tool_calls: Vec::new(),
        }),
        done: false,
    })
}

pub fn tool_call(name: &str, arguments: Value) -> Step {
    Step::Chunk(ChatChunk {
        message: Some(ChunkMessage {
            content: String::new(),
            tool_calls: vec![ToolCallFragment {
                id: None,
                function: FunctionCall {
                    name: name.to_string(),
                    arguments,
                },
            }],
        }),
        done: false,
    })
}

pub fn done() -> Step {
    Step::Chunk(ChatChunk {
        message: None,
        done: true,
    })
}

pub fn gate(notify: Arc<Notify>) -> Step {
    Step::Gate(notify)
}

pub fn cancel(handle: AbortHandle) -> Step {
    Step::Cancel(handle)
}

pub fn fail(message: &str) -> Step {
    Step::Fail(message.to_string())
}

/// Replays scripted chunk streams, one script per `chat_stream` call
pub struct ScriptedLlm {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    /// Number of tool schemas offered on each call
    pub tools_per_call: Mutex<Vec<usize>>,
}

impl ScriptedLlm {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            tools_per_call: Mutex::new(Vec::new()),
        }
    }

    pub fn remaining_scripts(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_stream(
        &self,
        _model: &str,
        _messages: Vec<ChatMessage>,
        tools: Vec<Value>,
        _options: ChatOptions,
        _cancel: CancellationToken,
    ) -> Result<ChatChunkStream> {
        self.tools_per_call.lock().unwrap().push(tools.len());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::stream("no scripted response left"))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for step in script {
                match step {
                    Step::Chunk(chunk) => {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                    Step::Gate(gate) => gate.notified().await,
                    Step::Cancel(handle) => handle.cancel(),
                    Step::Fail(message) => {
                        let _ = tx.send(Err(Error::stream(message))).await;
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

/// Scripted tool servers that record call order
pub struct MockConnections {
    tools: HashMap<String, Vec<ToolDefinition>>,
    results: HashMap<String, std::result::Result<Value, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockConnections {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            results: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tool(
        mut self,
        server: &str,
        tool: &str,
        result: std::result::Result<Value, String>,
    ) -> Self {
        self.tools
            .entry(server.to_string())
            .or_default()
            .push(ToolDefinition {
                server: server.to_string(),
                name: tool.to_string(),
                description: format!("{tool} tool"),
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
            });
        self.results
            .insert(format!("{server}.{tool}"), result);
        self
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolConnections for MockConnections {
    async fn call_tool(&self, server: &str, tool: &str, _arguments: Value) -> anyhow::Result<Value> {
        let key = format!("{server}.{tool}");
        self.calls.lock().unwrap().push(key.clone());
        match self.results.get(&key) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!("{message}")),
            None => Err(anyhow::anyhow!("unknown tool {key}")),
        }
    }

    async fn tools_by_server(&self) -> HashMap<String, Vec<ToolDefinition>> {
        self.tools.clone()
    }

    async fn has_server(&self, server: &str) -> bool {
        self.tools.contains_key(server)
    }
}

/// A store wired to mocks, with the given model
pub fn store_with(llm: Arc<ScriptedLlm>, connections: Arc<MockConnections>, model: &str) -> ChatStore {
    let config = ChatConfig {
        model: model.to_string(),
        ..Default::default()
    };
    ChatStore::new(llm, connections, Arc::new(InMemoryApi::new()), config)
}
