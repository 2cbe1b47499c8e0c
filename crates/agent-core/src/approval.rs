// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Human-in-the-loop approval gating (C4).
//!
//! Grounded on the teacher's `ask_question` tool: a request is published and
//! the caller awaits a correlated response, with a timeout standing in for
//! the oneshot channel the TUI-aware version of that tool uses directly.
//! Here the correlation key is the `approval_id` carried on the event bus
//! rather than an embedded `oneshot::Sender`, since requests and responses
//! both have to cross the bus to reach an out-of-process host.
use std::sync::Arc;

use agent_config::AgentConfig;
use agent_tools::{CommandWhitelist, Tool};
use tracing::warn;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::events::{AgentEvent, ApprovalDecision};

/// Whether a tool call may run without asking, must be confirmed, or is
/// refused outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Auto,
    Ask,
}

pub struct ApprovalManager {
    config: Arc<AgentConfig>,
    whitelist: CommandWhitelist,
}

impl ApprovalManager {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        let whitelist = CommandWhitelist::new(&config.command_whitelist);
        Self { config, whitelist }
    }

    /// Decide, without asking anyone, whether a call can skip approval.
    /// `command_preview` is the tool's rendered preview string (e.g. the
    /// shell command for `execute_command`) when it has one.
    pub fn decide_policy(&self, tool: &dyn Tool, command_preview: Option<&str>) -> PolicyDecision {
        if self
            .config
            .auto_approved_tools
            .iter()
            .any(|t| t == tool.name())
        {
            return PolicyDecision::Auto;
        }
        if let Some(cmd) = command_preview {
            if self.whitelist.is_whitelisted(cmd) {
                return PolicyDecision::Auto;
            }
        }
        PolicyDecision::Ask
    }

    /// Publish an approval request and wait for a correlated response, a
    /// denial, or the configured timeout. Responses that don't carry this
    /// request's `approval_id` — a race with an already-resolved request —
    /// are dropped and waiting continues until the deadline.
    pub async fn request(
        &self,
        bus: &mut EventBus,
        tool_name: &str,
        preview: String,
    ) -> ApprovalDecision {
        let approval_id = Uuid::new_v4().to_string();
        bus.publish(AgentEvent::ApprovalRequested {
            approval_id: approval_id.clone(),
            tool_name: tool_name.to_string(),
            preview,
        })
        .await;

        let deadline = tokio::time::Instant::now() + self.config.approval_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return self.finish(bus, approval_id, ApprovalDecision::TimedOut).await;
            }
            match tokio::time::timeout(remaining, bus.next_approval_response()).await {
                Ok(Some(resp)) if resp.approval_id == approval_id => {
                    let decision = if resp.approved {
                        ApprovalDecision::Approved
                    } else {
                        ApprovalDecision::Denied
                    };
                    return self.finish(bus, approval_id, decision).await;
                }
                Ok(Some(stale)) => {
                    warn!(
                        approval_id = %stale.approval_id,
                        expected = %approval_id,
                        "dropped stale approval response"
                    );
                }
                Ok(None) => return self.finish(bus, approval_id, ApprovalDecision::TimedOut).await,
                Err(_) => return self.finish(bus, approval_id, ApprovalDecision::TimedOut).await,
            }
        }
    }

    async fn finish(
        &self,
        bus: &mut EventBus,
        approval_id: String,
        decision: ApprovalDecision,
    ) -> ApprovalDecision {
        bus.publish(AgentEvent::ApprovalResolved {
            approval_id,
            decision,
        })
        .await;
        decision
    }
}
