//! Streaming turn orchestration
//!
//! One turn runs `Submitted → Streaming → [ToolExecuting → Streaming]* →
//! Settled(Ready | Error | Cancelled)`. The orchestrator is the only mutator
//! of conversation state while a turn is in flight: every mutation happens
//! under the conversation lock between suspension points, so observers never
//! see a half-updated turn. Every path out of `run` goes through `settle`,
//! which clears all streaming flags.

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use tandem_core::{ChatMessage, Result, ToolCall, ToolCallRequest};
use tandem_llm::{supports_tools, ChatOptions, LlmClient, ToolCallFragment};
use tandem_tools::{flatten_tools, ToolConnections, ToolExecutor};

use crate::cancel::{append_cancellation_marker, AbortHandle};
use crate::conversation::{AssistantTurn, SharedConversation, Turn};
use crate::thinking::split_thinking;

/// Separator between the initial response and follow-up text
const FOLLOWUP_SEPARATOR: &str = "\n\n";

/// Configuration for chat turns
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model identifier on the runtime
    pub model: String,
    /// Whether to prefix history with the developer prompt
    pub developer_mode: bool,
    pub developer_prompt: String,
    /// Cap on tool-execution rounds within one turn
    pub max_tool_rounds: usize,
    pub options: ChatOptions,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:8b".to_string(),
            developer_mode: false,
            developer_prompt: String::new(),
            max_tool_rounds: 8,
            options: ChatOptions::default(),
        }
    }
}

/// Terminal state of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Ready,
    Error,
    Cancelled,
}

/// Result of one streaming round
struct StreamRound {
    /// User-visible response text of this round
    response: String,
    /// Tool calls accumulated from the round's chunks, in delivery order
    tool_calls: Vec<ToolCallRequest>,
}

/// Drives one conversation turn through the streaming state machine
pub struct TurnOrchestrator {
    llm: Arc<dyn LlmClient>,
    connections: Arc<dyn ToolConnections>,
    executor: ToolExecutor,
}

impl TurnOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, connections: Arc<dyn ToolConnections>) -> Self {
        let executor = ToolExecutor::new(connections.clone());
        Self {
            llm,
            connections,
            executor,
        }
    }

    /// Run one turn to settlement.
    ///
    /// Appends the user turn and a streaming assistant placeholder, then
    /// streams, executes requested tools sequentially, and streams follow-ups
    /// until the model stops requesting tools, the round cap is hit, the
    /// stream fails, or the handle is cancelled.
    pub async fn run(
        &self,
        conversation: SharedConversation,
        text: String,
        selected_tools: Vec<String>,
        config: &ChatConfig,
        handle: AbortHandle,
    ) -> TurnOutcome {
        let by_server = self.connections.tools_by_server().await;
        let selected = if selected_tools.is_empty() {
            Vec::new()
        } else {
            flatten_tools(&by_server, Some(&selected_tools))
        };
        let model_supports_tools = supports_tools(&config.model);

        // Submitted: user turn + streaming placeholder
        let mut history = {
            let mut conv = conversation.write().await;
            conv.push(Turn::user(text));
            if !selected.is_empty() && !model_supports_tools {
                warn!(model = %config.model, "model does not support tool calling");
                conv.push(Turn::system(format!(
                    "Selected tools are unavailable: model {} does not support tool calling.",
                    config.model
                )));
            }
            let mut history = Vec::new();
            if config.developer_mode && !config.developer_prompt.trim().is_empty() {
                history.push(ChatMessage::system(config.developer_prompt.clone()));
            }
            history.extend(conv.history());
            conv.push(Turn::Assistant(AssistantTurn::streaming()));
            history
        };

        let tool_schemas: Vec<Value> = if model_supports_tools {
            selected.iter().map(|t| t.to_function_schema()).collect()
        } else {
            Vec::new()
        };

        let mut content_prefix = String::new();
        let mut thinking_prefix = String::new();
        let mut rounds = 0usize;

        loop {
            let round = match self
                .stream_round(
                    &conversation,
                    &history,
                    &tool_schemas,
                    config,
                    &handle,
                    &content_prefix,
                    &thinking_prefix,
                )
                .await
            {
                Ok(round) => round,
                Err(e) => {
                    // A transport failure racing a cancellation settles as cancelled
                    if handle.is_cancelled() {
                        return self.settle(&conversation, TurnOutcome::Cancelled, None).await;
                    }
                    error!(error = %e, "chat stream failed");
                    return self
                        .settle(&conversation, TurnOutcome::Error, Some(e.to_string()))
                        .await;
                }
            };

            if handle.is_cancelled() {
                return self.settle(&conversation, TurnOutcome::Cancelled, None).await;
            }

            if round.tool_calls.is_empty() {
                return self.settle(&conversation, TurnOutcome::Ready, None).await;
            }

            rounds += 1;
            if rounds > config.max_tool_rounds {
                warn!(rounds, "tool round limit reached, settling turn");
                return self.settle(&conversation, TurnOutcome::Ready, None).await;
            }

            // ToolExecuting: freeze content, run calls strictly in request order
            let (frozen_content, frozen_thinking) = {
                let mut conv = conversation.write().await;
                match conv.streaming_assistant_mut() {
                    Some(turn) => {
                        turn.is_tool_executing = true;
                        turn.is_thinking_streaming = false;
                        (turn.content.clone(), turn.thinking.clone())
                    }
                    None => (String::new(), String::new()),
                }
            };

            info!(count = round.tool_calls.len(), "executing tool calls");
            let mut records: Vec<ToolCall> = Vec::new();
            for request in &round.tool_calls {
                // Once cancelled, no new tool call may begin
                if handle.is_cancelled() {
                    break;
                }
                let record = self.executor.execute(request).await;
                let mut conv = conversation.write().await;
                if let Some(turn) = conv.streaming_assistant_mut() {
                    turn.tool_calls.push(record.clone());
                }
                records.push(record);
            }

            {
                let mut conv = conversation.write().await;
                if let Some(turn) = conv.streaming_assistant_mut() {
                    turn.is_tool_executing = false;
                }
            }

            if handle.is_cancelled() {
                return self.settle(&conversation, TurnOutcome::Cancelled, None).await;
            }

            if !records.iter().any(ToolCall::succeeded) {
                // Every call failed: the accumulated text and per-call error
                // records stand as the final state, no follow-up stream.
                return self.settle(&conversation, TurnOutcome::Ready, None).await;
            }

            // Follow-up: history gains the tool-call message and all results,
            // in the exact order the tools were requested
            history.push(ChatMessage::assistant_with_tool_calls(
                round.response.clone(),
                round.tool_calls.clone(),
            ));
            for record in &records {
                let content = match (&record.result, &record.error) {
                    (Some(result), _) => result.clone(),
                    (None, Some(error)) => format!("Error: {error}"),
                    (None, None) => String::new(),
                };
                history.push(ChatMessage::tool_result(record.id.clone(), content));
            }

            content_prefix = frozen_content;
            thinking_prefix = frozen_thinking;
        }
    }

    /// One streaming call: consume chunks in delivery order, re-splitting the
    /// full accumulator each time, until `done`, cancellation, or failure.
    #[allow(clippy::too_many_arguments)]
    async fn stream_round(
        &self,
        conversation: &SharedConversation,
        history: &[ChatMessage],
        tools: &[Value],
        config: &ChatConfig,
        handle: &AbortHandle,
        content_prefix: &str,
        thinking_prefix: &str,
    ) -> Result<StreamRound> {
        let mut rx = self
            .llm
            .chat_stream(
                &config.model,
                history.to_vec(),
                tools.to_vec(),
                config.options.clone(),
                handle.token(),
            )
            .await?;

        let mut raw = String::new();
        let mut response = String::new();
        let mut tool_calls: Vec<ToolCallRequest> = Vec::new();

        while let Some(chunk) = rx.recv().await {
            // Abort short-circuit: the last fully-applied split stands
            if handle.is_cancelled() {
                break;
            }
            let chunk = chunk?;
            let done = chunk.done;
            if let Some(message) = chunk.message {
                if !message.content.is_empty() {
                    raw.push_str(&message.content);
                    let split = split_thinking(&raw);
                    let mut conv = conversation.write().await;
                    if let Some(turn) = conv.streaming_assistant_mut() {
                        turn.content = join_with_separator(content_prefix, &split.response);
                        turn.thinking = join_with_separator(thinking_prefix, &split.thinking);
                        turn.is_thinking_streaming = split.thinking_open;
                    }
                    response = split.response;
                }
                for fragment in message.tool_calls {
                    tool_calls.push(request_from_fragment(fragment));
                }
            }
            if done {
                break;
            }
        }

        Ok(StreamRound {
            response,
            tool_calls,
        })
    }

    /// The single settlement path: every terminal transition clears all three
    /// streaming flags here.
    async fn settle(
        &self,
        conversation: &SharedConversation,
        outcome: TurnOutcome,
        error: Option<String>,
    ) -> TurnOutcome {
        let mut conv = conversation.write().await;
        if let Some(turn) = conv.streaming_assistant_mut() {
            match outcome {
                TurnOutcome::Cancelled => {
                    turn.content = append_cancellation_marker(&turn.content);
                }
                TurnOutcome::Error => {
                    turn.content =
                        format!("Error: {}", error.unwrap_or_else(|| "unknown error".into()));
                }
                TurnOutcome::Ready => {}
            }
            turn.settle();
        }
        outcome
    }
}

/// Join an earlier round's frozen text with the current round's text
fn join_with_separator(prefix: &str, part: &str) -> String {
    if prefix.is_empty() {
        part.to_string()
    } else if part.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}{FOLLOWUP_SEPARATOR}{part}")
    }
}

/// Build a tool-call request from a wire fragment.
fn request_from_fragment(fragment: ToolCallFragment) -> ToolCallRequest {
    // Some runtimes deliver arguments as a JSON-encoded string
    let arguments = match fragment.function.arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    };
    ToolCallRequest {
        id: fragment
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: fragment.function.name,
        arguments,
    }
}
