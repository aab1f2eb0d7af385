//! Developer chat REPL against a local Ollama instance.
//!
//! Composes the client, connection registry, and store explicitly at startup;
//! no global state. Type a message and the assistant turn streams to
//! completion before the next prompt.

use clap::Parser;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tandem_chat::{ChatConfig, ChatStore, InMemoryApi, Turn};
use tandem_llm::OllamaClient;
use tandem_tools::ConnectionRegistry;

#[derive(Parser)]
#[command(name = "tandem", about = "Chat against a local Ollama runtime")]
struct Args {
    /// Ollama base URL
    #[arg(long, default_value = "http://localhost:11434")]
    base_url: String,

    /// Model to chat with
    #[arg(long, default_value = "qwen3:8b")]
    model: String,

    /// Optional system prompt prepended to every turn
    #[arg(long)]
    developer_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let llm = Arc::new(OllamaClient::with_base_url(args.base_url));
    let connections = Arc::new(ConnectionRegistry::new());
    let api = Arc::new(InMemoryApi::new());
    let config = ChatConfig {
        model: args.model,
        developer_mode: args.developer_prompt.is_some(),
        developer_prompt: args.developer_prompt.unwrap_or_default(),
        ..Default::default()
    };

    let store = ChatStore::new(llm, connections, api, config);
    store.init().await?;

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" {
            break;
        }

        match store.send_message(input, Vec::new()).await {
            Ok(_) => {
                if let Some(conversation) = store.selected().await {
                    let conversation = conversation.read().await;
                    if let Some(Turn::System(advisory)) = conversation.turns.iter().rev().nth(1) {
                        println!("[notice] {}", advisory.content);
                    }
                    if let Some(turn) = conversation.last_assistant() {
                        if !turn.thinking.is_empty() {
                            println!("(thinking) {}", turn.thinking);
                        }
                        println!("{}", turn.content);
                    }
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
