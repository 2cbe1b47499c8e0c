// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agent_model::{Message, Role};
use agent_tools::{OutputCategory, Tool, ToolCall, ToolOutput, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::approval::{ApprovalManager, PolicyDecision};
use crate::bus::EventBus;
use crate::events::{AgentEvent, ApprovalDecision};
use crate::memory::ConversationMemory;
use crate::truncation::smart_truncate;

/// Result of dispatching one tool call, reported back to the Iteration
/// Controller (C6) so it knows whether to keep iterating.
pub struct DispatchOutcome {
    pub output: ToolOutput,
    pub is_loop_breaking: bool,
}

/// Decode → registry lookup → argument validation → preview + approval →
/// execute → report (C5).
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    approvals: ApprovalManager,
    tool_result_token_cap: usize,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        approvals: ApprovalManager,
        tool_result_token_cap: usize,
    ) -> Self {
        Self {
            registry,
            approvals,
            tool_result_token_cap,
        }
    }

    #[instrument(skip(self, bus, memory, arguments))]
    pub async fn dispatch(
        &self,
        bus: &mut EventBus,
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        memory: &mut ConversationMemory,
    ) -> DispatchOutcome {
        let Some(tool) = self.registry.get(&tool_name) else {
            return self
                .report_error(
                    bus,
                    memory,
                    &call_id,
                    &tool_name,
                    format!("unknown tool: {tool_name}"),
                    false,
                )
                .await;
        };

        if arguments.as_object().is_none() {
            return self
                .report_error(
                    bus,
                    memory,
                    &call_id,
                    &tool_name,
                    "tool arguments must be a JSON object".to_string(),
                    tool.is_loop_breaking(),
                )
                .await;
        }

        let schema_errors = agent_tools::validate(&tool.parameters_schema(), &arguments);
        if !schema_errors.is_empty() {
            let msg = schema_errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return self
                .report_error(
                    bus,
                    memory,
                    &call_id,
                    &tool_name,
                    format!("invalid arguments: {msg}"),
                    tool.is_loop_breaking(),
                )
                .await;
        }

        let call = ToolCall {
            id: call_id.clone(),
            name: tool_name.clone(),
            args: arguments,
        };

        let preview = if tool.is_previewable() {
            Some(tool.preview(&call))
        } else {
            None
        };

        let policy = self.approvals.decide_policy(&*tool, preview.as_deref());
        if policy == PolicyDecision::Ask {
            let decision = self
                .approvals
                .request(bus, &tool_name, preview.clone().unwrap_or_else(|| call.args.to_string()))
                .await;
            match decision {
                ApprovalDecision::Approved => {}
                ApprovalDecision::Denied => {
                    return self
                        .report_error(
                            bus,
                            memory,
                            &call_id,
                            &tool_name,
                            "tool call was denied by the user".to_string(),
                            tool.is_loop_breaking(),
                        )
                        .await;
                }
                ApprovalDecision::TimedOut => {
                    return self
                        .report_error(
                            bus,
                            memory,
                            &call_id,
                            &tool_name,
                            "approval request timed out".to_string(),
                            tool.is_loop_breaking(),
                        )
                        .await;
                }
            }
        }

        bus.publish(AgentEvent::ToolStarted {
            call_id: call_id.clone(),
            tool_name: tool_name.clone(),
        })
        .await;
        debug!(tool = %tool_name, "dispatching tool call");

        let output = if tool.is_streamable() {
            self.execute_streamed(bus, &call, &tool).await
        } else {
            tool.execute(&call).await
        };

        self.report(bus, memory, &tool_name, output, tool.is_loop_breaking()).await
    }

    async fn execute_streamed(
        &self,
        bus: &mut EventBus,
        call: &ToolCall,
        tool: &Arc<dyn Tool>,
    ) -> ToolOutput {
        let cancel = CancellationToken::new();
        let publisher = bus.publisher();
        let chunk_call_id = call.id.clone();
        let on_chunk = move |line: String| {
            publisher.publish(AgentEvent::CommandOutput {
                call_id: chunk_call_id.clone(),
                line,
            });
        };

        let exec = tool.execute_streaming(call, cancel.clone(), &on_chunk);
        tokio::pin!(exec);

        loop {
            tokio::select! {
                output = &mut exec => return output,
                maybe_req = bus.next_cancellation_request() => {
                    if let Some(req) = maybe_req {
                        if req.call_id == call.id {
                            cancel.cancel();
                        }
                    }
                }
            }
        }
    }

    async fn report(
        &self,
        bus: &mut EventBus,
        memory: &mut ConversationMemory,
        tool_name: &str,
        output: ToolOutput,
        is_loop_breaking: bool,
    ) -> DispatchOutcome {
        let category = self
            .registry
            .get(tool_name)
            .map(|t| t.output_category())
            .unwrap_or(OutputCategory::Generic);
        let content = smart_truncate(&output.content, category, self.tool_result_token_cap);

        if output.is_error {
            bus.publish(AgentEvent::ToolResultError {
                call_id: output.call_id.clone(),
                tool_name: tool_name.to_string(),
                message: content.clone(),
            })
            .await;
        } else {
            bus.publish(AgentEvent::ToolResult {
                call_id: output.call_id.clone(),
                tool_name: tool_name.to_string(),
                content: content.clone(),
            })
            .await;
        }
        memory.push(Message::new(Role::Tool, content));

        DispatchOutcome {
            output,
            is_loop_breaking,
        }
    }

    async fn report_error(
        &self,
        bus: &mut EventBus,
        memory: &mut ConversationMemory,
        call_id: &str,
        tool_name: &str,
        message: String,
        is_loop_breaking: bool,
    ) -> DispatchOutcome {
        let output = ToolOutput::err(call_id, message);
        self.report(bus, memory, tool_name, output, is_loop_breaking).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_config::AgentConfig;
    use agent_tools::builtin::{CalculatorTool, TaskCompletionTool};
    use serde_json::json;

    fn dispatcher_with(registry: ToolRegistry) -> ToolDispatcher {
        let config = Arc::new(AgentConfig::default());
        let approvals = ApprovalManager::new(config.clone());
        ToolDispatcher::new(Arc::new(registry), approvals, config.tool_result_max_tokens)
    }

    #[tokio::test]
    async fn unknown_tool_reports_error_without_asking() {
        let registry = ToolRegistry::new();
        let dispatcher = dispatcher_with(registry);
        let mut bus = EventBus::new();
        let mut memory = ConversationMemory::new();
        let outcome = dispatcher
            .dispatch(
                &mut bus,
                "1".into(),
                "does_not_exist".into(),
                json!({}),
                &mut memory,
            )
            .await;
        assert!(outcome.output.is_error);
        assert!(!outcome.is_loop_breaking);
    }

    #[tokio::test]
    async fn known_auto_tool_executes_and_reports_success() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let dispatcher = dispatcher_with(registry);
        let mut bus = EventBus::new();
        let mut memory = ConversationMemory::new();
        let outcome = dispatcher
            .dispatch(
                &mut bus,
                "1".into(),
                "calculator".into(),
                json!({ "expression": "2 + 2" }),
                &mut memory,
            )
            .await;
        assert!(!outcome.output.is_error);
        assert_eq!(outcome.output.content, "4");
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn loop_breaking_flag_is_propagated() {
        let mut registry = ToolRegistry::new();
        registry.register(TaskCompletionTool);
        let dispatcher = dispatcher_with(registry);
        let mut bus = EventBus::new();
        let mut memory = ConversationMemory::new();
        let outcome = dispatcher
            .dispatch(
                &mut bus,
                "1".into(),
                "task_completion".into(),
                json!({ "summary": "done" }),
                &mut memory,
            )
            .await;
        assert!(outcome.is_loop_breaking);
    }

    #[tokio::test]
    async fn invalid_arguments_fail_schema_validation_before_execution() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let dispatcher = dispatcher_with(registry);
        let mut bus = EventBus::new();
        let mut memory = ConversationMemory::new();
        let outcome = dispatcher
            .dispatch(
                &mut bus,
                "1".into(),
                "calculator".into(),
                json!({ "wrong_key": "1+1" }),
                &mut memory,
            )
            .await;
        assert!(outcome.output.is_error);
        assert!(outcome.output.content.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn bus_cancellation_request_stops_a_streaming_tool() {
        use agent_tools::builtin::ExecuteCommandTool;

        let mut registry = ToolRegistry::new();
        registry.register(ExecuteCommandTool::new(std::time::Duration::from_secs(30)));
        let mut config = AgentConfig::default();
        config.auto_approved_tools.push("execute_command".to_string());
        let config = Arc::new(config);
        let approvals = ApprovalManager::new(config.clone());
        let dispatcher = ToolDispatcher::new(Arc::new(registry), approvals, config.tool_result_max_tokens);
        let mut bus = EventBus::new();
        let mut memory = ConversationMemory::new();

        let cancel_tx = bus.cancellation_sender();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let _ = cancel_tx
                .send(crate::bus::CancellationRequest {
                    call_id: "1".into(),
                })
                .await;
        });

        let outcome = dispatcher
            .dispatch(
                &mut bus,
                "1".into(),
                "execute_command".into(),
                json!({ "command": "sleep 60" }),
                &mut memory,
            )
            .await;

        assert!(outcome.output.is_error);
        assert!(outcome.output.content.contains("cancelled"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let dispatcher = dispatcher_with(registry);
        let mut bus = EventBus::new();
        let mut memory = ConversationMemory::new();
        let outcome = dispatcher
            .dispatch(
                &mut bus,
                "1".into(),
                "calculator".into(),
                json!("not an object"),
                &mut memory,
            )
            .await;
        assert!(outcome.output.is_error);
    }
}
