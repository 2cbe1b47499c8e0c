// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Iteration Controller (C6): drives the reason→act→observe loop for one
//! user turn, enforces the iteration cap and circuit breaker, and
//! coordinates C2 through C5 plus the Context Compactor.
use std::sync::Arc;

use agent_config::AgentConfig;
use agent_model::{Message, ModelProvider, Role};
use agent_tools::ToolRegistry;
use futures::StreamExt;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::approval::ApprovalManager;
use crate::bus::EventBus;
use crate::compactor::Compactor;
use crate::dispatcher::ToolDispatcher;
use crate::error::AgentError;
use crate::events::{AgentEvent, TurnEndReason};
use crate::json_repair::text_contains_malformed_tool_call;
use crate::memory::ConversationMemory;
use crate::parser::{ParseEvent, StreamingParser, ToolCallEnvelope};
use crate::prompts::build_system_prompt;

/// A fixed-size ring of the most recent error signatures. The breaker trips
/// when every slot is populated and all hold the same signature.
struct BreakerRing {
    window: usize,
    entries: Vec<String>,
}

impl BreakerRing {
    fn new(window: usize) -> Self {
        Self {
            window,
            entries: Vec::with_capacity(window),
        }
    }

    /// Record a signature and report whether the ring just tripped.
    fn record(&mut self, signature: impl Into<String>) -> bool {
        self.entries.push(signature.into());
        if self.entries.len() > self.window {
            self.entries.remove(0);
        }
        self.window > 0
            && self.entries.len() == self.window
            && self.entries.iter().all(|s| s == &self.entries[0])
    }

    fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Truncate a tool error message into a short, stable signature so message
/// churn (timestamps, ids) doesn't prevent the breaker from recognizing a
/// genuinely repeating failure.
fn tool_error_signature(message: &str) -> String {
    let truncated: String = message.chars().take(80).collect();
    format!("tool-error:{truncated}")
}

pub struct IterationController {
    config: Arc<AgentConfig>,
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    dispatcher: ToolDispatcher,
    compactor: Compactor,
}

impl IterationController {
    pub fn new(config: Arc<AgentConfig>, provider: Arc<dyn ModelProvider>, registry: Arc<ToolRegistry>) -> Self {
        let approvals = ApprovalManager::new(config.clone());
        let dispatcher = ToolDispatcher::new(registry.clone(), approvals, config.tool_result_max_tokens);
        let compactor = Compactor::new(config.context.clone());
        Self {
            config,
            provider,
            registry,
            dispatcher,
            compactor,
        }
    }

    /// Run one full turn for `user_message`, driving iterations until a
    /// loop-breaking tool call, the iteration cap, or a circuit-breaker
    /// trip. Returns the reason the turn ended.
    pub async fn run_turn(
        &self,
        bus: &mut EventBus,
        memory: &mut ConversationMemory,
        user_message: String,
    ) -> TurnEndReason {
        memory.push(Message::user(user_message));

        let mut breaker = BreakerRing::new(self.config.breaker_window);
        let mut error_context: Option<String> = None;
        let mut iteration: u32 = 0;

        let reason = loop {
            if bus.shutdown_requested() {
                break TurnEndReason::Shutdown;
            }

            if iteration >= self.config.max_iterations {
                bus.publish(AgentEvent::IterationCapReached {
                    max: self.config.max_iterations,
                })
                .await;
                break TurnEndReason::IterationCapReached;
            }

            if memory.token_count() > self.config.prune_threshold_tokens() {
                memory.prune(self.config.max_tokens);
            }

            bus.publish(AgentEvent::TurnStarted { iteration }).await;

            match self.run_iteration(bus, memory, error_context.take()).await {
                Ok(IterationOutcome::LoopBreaking { tool_name }) => {
                    break TurnEndReason::LoopBreakingTool { tool_name };
                }
                Ok(IterationOutcome::Continue { signature, recoverable_error }) => {
                    if let Some(sig) = signature {
                        if breaker.record(sig) {
                            bus.publish(AgentEvent::CircuitBreakerTripped {
                                signature: "repeated error".to_string(),
                                window: self.config.breaker_window,
                            })
                            .await;
                            breaker.reset();
                            break TurnEndReason::CircuitBreakerTripped;
                        }
                    } else {
                        breaker.reset();
                    }
                    error_context = recoverable_error;
                    iteration += 1;
                }
                Err(AgentError::Oversized { limit }) => {
                    warn!(limit, "oversized tool-call payload; ending turn");
                    break TurnEndReason::OversizedToolCall { limit };
                }
                Err(e) => {
                    warn!(error = %e, "iteration controller aborting turn on provider error");
                    break TurnEndReason::ProviderError {
                        message: e.to_string(),
                    };
                }
            }
        };

        if self.compactor.should_compact(&memory.snapshot()) {
            match self
                .compactor
                .compact(&memory.snapshot(), self.provider.as_ref(), bus)
                .await
            {
                Ok(rebuilt) => memory.replace(rebuilt),
                Err(e) => warn!(error = %e, "compaction failed; leaving memory unchanged"),
            }
        }

        bus.publish(AgentEvent::TurnComplete {
            reason: reason.clone(),
        })
        .await;
        reason
    }

    async fn run_iteration(
        &self,
        bus: &mut EventBus,
        memory: &mut ConversationMemory,
        error_context: Option<String>,
    ) -> Result<IterationOutcome, AgentError> {
        let system_prompt = build_system_prompt(&self.registry.schemas(), error_context.as_deref());
        let mut messages = vec![Message::system(system_prompt)];
        messages.extend(memory.snapshot());

        let mut stream = self.provider.stream(&messages).await?;
        let mut parser = StreamingParser::new(self.config.tool_xml_max_bytes);
        let mut assistant_text = String::new();
        let mut terminal: Option<ParseEvent> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in parser.feed(&chunk) {
                self.handle_stream_event(bus, event, &mut assistant_text, &mut terminal).await;
            }
        }
        for event in parser.finish() {
            self.handle_stream_event(bus, event, &mut assistant_text, &mut terminal).await;
        }

        if let Some(actual) = self.provider.last_input_tokens() {
            let estimated = messages.iter().map(Message::approx_tokens).sum();
            memory.update_calibration(actual, estimated);
        }

        match terminal {
            Some(ParseEvent::ToolCall(envelope)) => {
                Ok(self.dispatch_tool_call(bus, memory, envelope, assistant_text).await)
            }
            Some(ParseEvent::InvalidToolJson { error, .. }) => {
                memory.push(Message::assistant(assistant_text));
                let note = format!("Your tool call was not valid JSON: {error}");
                info!(%note, "invalid tool json");
                Ok(IterationOutcome::Continue {
                    signature: Some("invalid-json".to_string()),
                    recoverable_error: Some(note),
                })
            }
            Some(ParseEvent::UnsupportedServer { server_name }) => {
                memory.push(Message::assistant(assistant_text));
                let note = format!("Unsupported server_name '{server_name}'; use \"local\".");
                Ok(IterationOutcome::Continue {
                    signature: Some("unsupported-server".to_string()),
                    recoverable_error: Some(note),
                })
            }
            Some(ParseEvent::Oversized { limit }) => {
                memory.push(Message::assistant(assistant_text));
                Err(AgentError::Oversized { limit })
            }
            Some(ParseEvent::Text(_)) | Some(ParseEvent::Thinking(_)) | None => {
                memory.push(Message::assistant(assistant_text.clone()));
                bus.publish(AgentEvent::Warning {
                    message: "no tool call in this turn".to_string(),
                })
                .await;
                let signature = if text_contains_malformed_tool_call(&assistant_text) {
                    "malformed-tool-call-in-prose"
                } else {
                    "no-tool-call"
                };
                Ok(IterationOutcome::Continue {
                    signature: Some(signature.to_string()),
                    recoverable_error: Some(
                        "You did not call a tool; call one using <tool>...</tool>.".to_string(),
                    ),
                })
            }
        }
    }

    async fn handle_stream_event(
        &self,
        bus: &mut EventBus,
        event: ParseEvent,
        assistant_text: &mut String,
        terminal: &mut Option<ParseEvent>,
    ) {
        match event {
            ParseEvent::Text(t) => {
                bus.publish(AgentEvent::AssistantText { chunk: t.clone() }).await;
                assistant_text.push_str(&t);
            }
            ParseEvent::Thinking(t) => {
                bus.publish(AgentEvent::Thinking { chunk: t }).await;
            }
            other => *terminal = Some(other),
        }
    }

    async fn dispatch_tool_call(
        &self,
        bus: &mut EventBus,
        memory: &mut ConversationMemory,
        envelope: ToolCallEnvelope,
        assistant_text: String,
    ) -> IterationOutcome {
        let call_id = Uuid::new_v4().to_string();
        let raw_span = format!(
            "<tool>{{\"server_name\":\"local\",\"tool_name\":\"{}\",\"arguments\":{}}}</tool>",
            envelope.tool_name, envelope.arguments
        );
        let persisted = if assistant_text.is_empty() {
            raw_span.clone()
        } else {
            format!("{assistant_text}\n{raw_span}")
        };
        memory.push(
            Message::assistant(persisted).with_metadata("tool_name", Value::String(envelope.tool_name.clone())),
        );

        bus.publish(AgentEvent::ToolCallRequested {
            call_id: call_id.clone(),
            tool_name: envelope.tool_name.clone(),
            arguments: envelope.arguments.clone(),
        })
        .await;

        let outcome = self
            .dispatcher
            .dispatch(bus, call_id, envelope.tool_name.clone(), envelope.arguments, memory)
            .await;

        if outcome.is_loop_breaking {
            return IterationOutcome::LoopBreaking {
                tool_name: envelope.tool_name,
            };
        }

        if outcome.output.is_error {
            IterationOutcome::Continue {
                signature: Some(tool_error_signature(&outcome.output.content)),
                recoverable_error: Some(outcome.output.content),
            }
        } else {
            IterationOutcome::Continue {
                signature: None,
                recoverable_error: None,
            }
        }
    }
}

enum IterationOutcome {
    LoopBreaking { tool_name: String },
    Continue {
        signature: Option<String>,
        recoverable_error: Option<String>,
    },
}
