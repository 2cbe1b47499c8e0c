// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Thin binary: wires a `ModelProvider` and `ToolRegistry` into an
//! `IterationController` and runs a single turn for one user message.
//!
//! Usage: `agent-harness "<user message>"`.
//!
//! Config is loaded from `AGENT_CONFIG` (TOML, defaults applied for any
//! omitted key; missing file is not an error). The model provider is a
//! `ScriptedMockProvider` — this workspace has no concrete LLM backend in
//! scope — configured from the JSON script named by `AGENT_SCRIPT`
//! (an array of turns, each an array of raw chunks); absent that, a small
//! built-in demo script that calls `task_completion` immediately.
use std::sync::Arc;

use agent_config::AgentConfig;
use agent_core::{EventBus, IterationController};
use agent_model::{ModelProvider, ScriptedMockProvider};
use agent_tools::builtin::{CalculatorTool, ConverseTool, ExecuteCommandTool, TaskCompletionTool};
use agent_tools::ToolRegistry;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let user_message = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: agent-harness \"<user message>\""))?;

    let config = Arc::new(load_config());
    let registry = Arc::new(build_registry(&config));
    let provider: Arc<dyn ModelProvider> = Arc::new(load_provider(&user_message));

    let controller = IterationController::new(config, provider, registry);
    let mut bus = EventBus::new();
    let mut memory = agent_core::ConversationMemory::new();

    let mut receiver = bus.take_event_receiver();
    let drain = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        }
    });

    let reason = controller.run_turn(&mut bus, &mut memory, user_message).await;
    drop(bus);
    let _ = drain.await;

    eprintln!("turn ended: {reason:?}");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn load_config() -> AgentConfig {
    match std::env::var("AGENT_CONFIG") {
        Ok(path) => AgentConfig::load_from_file_or_default(path).unwrap_or_default(),
        Err(_) => AgentConfig::default(),
    }
}

fn build_registry(config: &AgentConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CalculatorTool);
    registry.register(TaskCompletionTool);
    registry.register(ConverseTool);
    registry.register(ExecuteCommandTool::new(config.command_default_timeout()));
    registry
}

fn load_provider(user_message: &str) -> ScriptedMockProvider {
    if let Ok(path) = std::env::var("AGENT_SCRIPT") {
        if let Ok(raw) = std::fs::read_to_string(&path) {
            if let Ok(script) = serde_json::from_str::<Vec<Vec<String>>>(&raw) {
                return ScriptedMockProvider::new(script);
            }
            tracing::warn!(path, "AGENT_SCRIPT did not parse as a JSON array of turns; using demo script");
        }
    }
    ScriptedMockProvider::tool_then_text(
        format!(
            r#"<tool>{{"server_name":"local","tool_name":"task_completion","arguments":{{"summary":"Acknowledged: {user_message}"}}}}</tool>"#
        ),
        "done",
    )
}
