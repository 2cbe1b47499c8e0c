// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Loop-breaking tool the model calls to declare the turn finished.
///
/// `task_completion` never fails: any arguments it receives are echoed back
/// as the final summary. The Iteration Controller treats its result as the
/// signal to stop, regardless of what the tool itself returns.
pub struct TaskCompletionTool;

#[async_trait]
impl Tool for TaskCompletionTool {
    fn name(&self) -> &str {
        "task_completion"
    }

    fn description(&self) -> &str {
        "Declare the current task complete. Call this once the requested work is \
         finished and there is nothing further to do. `summary` is shown to the \
         user as the final answer."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["summary"],
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "A short summary of what was accomplished"
                }
            }
        })
    }

    fn is_loop_breaking(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let summary = call
            .args
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("(no summary provided)");
        ToolOutput::ok(&call.id, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_supplied_summary() {
        let tool = TaskCompletionTool;
        let call = ToolCall {
            id: "1".into(),
            name: "task_completion".into(),
            args: json!({ "summary": "added the widget" }),
        };
        let out = tool.execute(&call).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "added the widget");
    }

    #[tokio::test]
    async fn missing_summary_still_succeeds() {
        let tool = TaskCompletionTool;
        let call = ToolCall {
            id: "1".into(),
            name: "task_completion".into(),
            args: json!({}),
        };
        let out = tool.execute(&call).await;
        assert!(!out.is_error);
    }

    #[test]
    fn is_loop_breaking() {
        assert!(TaskCompletionTool.is_loop_breaking());
    }
}
