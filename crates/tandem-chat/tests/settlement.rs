//! Settlement totality: every submitted turn ends in exactly one terminal
//! state with all streaming flags cleared, under randomized interleavings of
//! chunk delivery, tool success/failure, and cancellation.

mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use tokio::sync::RwLock;

use tandem_chat::{AbortHandle, ChatConfig, Conversation, TurnOrchestrator, TurnOutcome};

#[derive(Debug, Clone)]
struct Scenario {
    chunks: usize,
    /// One entry per requested tool call: does it succeed?
    tools: Vec<bool>,
    /// Cancel after this many scripted steps, if set
    cancel_at: Option<usize>,
    fail_stream: bool,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (
        0usize..4,
        prop::collection::vec(any::<bool>(), 0..3),
        prop::option::of(0usize..8),
        any::<bool>(),
    )
        .prop_map(|(chunks, tools, cancel_at, fail_stream)| Scenario {
            chunks,
            tools,
            cancel_at,
            fail_stream,
        })
}

async fn run_scenario(scenario: Scenario) -> (TurnOutcome, bool, bool, bool, usize) {
    let mut connections = MockConnections::new();
    for (i, ok) in scenario.tools.iter().enumerate() {
        let result = if *ok {
            Ok(serde_json::json!("ok"))
        } else {
            Err("failed".to_string())
        };
        connections = connections.with_tool("srv", &format!("t{i}"), result);
    }

    let handle = AbortHandle::new();

    let mut script = Vec::new();
    for i in 0..scenario.chunks {
        script.push(content(&format!("c{i} ")));
    }
    for i in 0..scenario.tools.len() {
        script.push(tool_call(&format!("srv_t{i}"), serde_json::json!({})));
    }
    if scenario.fail_stream {
        script.push(fail("broken pipe"));
    } else {
        script.push(done());
    }
    if let Some(at) = scenario.cancel_at {
        let at = at.min(script.len());
        script.insert(at, cancel(handle.clone()));
    }
    // follow-up rounds, if reached, complete without further tool calls
    let followup = vec![content("follow-up"), done()];

    let llm = Arc::new(ScriptedLlm::new(vec![script, followup]));
    let orchestrator = TurnOrchestrator::new(llm, Arc::new(connections));
    let conversation = Arc::new(RwLock::new(Conversation::new()));
    let selected: Vec<String> = (0..scenario.tools.len())
        .map(|i| format!("srv_t{i}"))
        .collect();
    let config = ChatConfig {
        model: "qwen3:8b".to_string(),
        ..Default::default()
    };

    let outcome = orchestrator
        .run(
            conversation.clone(),
            "go".to_string(),
            selected,
            &config,
            handle,
        )
        .await;

    let conversation = conversation.read().await;
    let turn = conversation
        .last_assistant()
        .expect("assistant turn present");
    let streaming_turns = conversation
        .turns
        .iter()
        .filter(|t| t.is_streaming())
        .count();
    (
        outcome,
        turn.is_streaming,
        turn.is_thinking_streaming,
        turn.is_tool_executing,
        streaming_turns,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]
    #[test]
    fn settlement_is_total(scenario in scenario()) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let (outcome, streaming, thinking, executing, streaming_turns) =
            rt.block_on(run_scenario(scenario));

        prop_assert!(matches!(
            outcome,
            TurnOutcome::Ready | TurnOutcome::Error | TurnOutcome::Cancelled
        ));
        prop_assert!(!streaming);
        prop_assert!(!thinking);
        prop_assert!(!executing);
        prop_assert_eq!(streaming_turns, 0);
    }
}
