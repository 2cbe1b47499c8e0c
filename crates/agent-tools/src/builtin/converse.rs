// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Loop-breaking tool the model calls to hand control back to the user
/// mid-task — analogous to the teacher's `ask_question`, but simpler: a
/// single free-form message rather than structured multiple-choice
/// questions, since there is no TUI in this design to render choices.
pub struct ConverseTool;

#[async_trait]
impl Tool for ConverseTool {
    fn name(&self) -> &str {
        "converse"
    }

    fn description(&self) -> &str {
        "Send a message to the user and end the current turn, waiting for their \
         reply before continuing. Use this when you need clarification or input \
         before proceeding."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["message"],
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to show the user"
                }
            }
        })
    }

    fn is_loop_breaking(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match call.args.get("message").and_then(Value::as_str) {
            Some(msg) => ToolOutput::ok(&call.id, msg),
            None => ToolOutput::err(&call.id, "missing 'message' argument"),
        }
    }
}
