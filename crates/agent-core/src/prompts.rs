// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! System preamble construction (identity, capabilities, tool-invocation
//! protocol, tool schemas, transient error reminder).
//!
//! Grounded on the teacher's `prompts::PromptContext`/`stable_only` split —
//! simplified to this workspace's single always-present system message since
//! there is no git/skills/knowledge context to separate into a cacheable
//! prefix here.
use agent_tools::ToolSchema;

const GUIDELINES: &str = "\
You are an autonomous coding and task agent. For every turn:
- Think step by step inside a single <thinking>...</thinking> span before acting.
- To call a tool, emit EXACTLY ONE <tool>...</tool> span containing a JSON object:
  {\"server_name\":\"local\",\"tool_name\":\"<name>\",\"arguments\":{...}}
- Do not call more than one tool per message. Wait for its result before continuing.
- When the task is complete, call the `task_completion` tool with a summary.
- If you need to ask the user something instead of finishing, call `converse`.";

/// Build the system message for one iteration: static guidelines, the
/// registered tools rendered as JSON schemas, and an optional transient
/// `error_context` reminder injected just before the tool list.
pub fn build_system_prompt(tools: &[ToolSchema], error_context: Option<&str>) -> String {
    let mut prompt = String::from(GUIDELINES);
    prompt.push_str("\n\n## Available tools\n");
    for tool in tools {
        prompt.push_str(&format!(
            "\n### {}\n{}\nSchema: {}\n",
            tool.name, tool.description, tool.parameters
        ));
    }
    if let Some(ctx) = error_context {
        prompt.push_str(&format!("\n## Reminder\n{ctx}\n"));
    }
    prompt
}
