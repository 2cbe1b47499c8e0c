// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::Serialize;
use serde_json::Value;

/// Everything the loop reports to a host (TUI, test harness, logger) as it
/// runs a turn. Emitted onto the bounded, single-producer single-consumer
/// event bus (C1); a host that falls behind makes the loop wait rather
/// than silently losing events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new reason→act→observe turn began.
    TurnStarted { iteration: u32 },

    /// A chunk of `<thinking>` text, in order, un-tagged.
    Thinking { chunk: String },

    /// A chunk of user-visible assistant prose, in order, un-tagged.
    AssistantText { chunk: String },

    /// The streaming parser finished decoding a `<tool>` span.
    ToolCallRequested {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// The Approval Manager is waiting on a human decision.
    ApprovalRequested {
        approval_id: String,
        tool_name: String,
        preview: String,
    },

    /// An approval request reached a terminal state.
    ApprovalResolved {
        approval_id: String,
        decision: ApprovalDecision,
    },

    /// Dispatch began executing a tool after approval (or auto-approval).
    ToolStarted { call_id: String, tool_name: String },

    /// One line of incremental output from a streaming tool.
    CommandOutput { call_id: String, line: String },

    /// A tool call finished successfully.
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
    },

    /// A tool call finished with an error (including a denied/timed-out
    /// approval).
    ToolResultError {
        call_id: String,
        tool_name: String,
        message: String,
    },

    /// Context compaction started summarizing a contiguous group.
    CompactionStarted { groups: usize },

    /// One of the concurrently-running per-group summarization jobs finished.
    SummarizationProgress { done: usize, total: usize },

    /// Context compaction finished, replacing memory atomically.
    CompactionCompleted {
        messages_before: usize,
        messages_after: usize,
    },

    /// The circuit breaker observed `window` consecutive matching error
    /// signatures and tripped, ending the turn.
    CircuitBreakerTripped { signature: String, window: usize },

    /// The iteration cap was reached without a loop-breaking tool call.
    IterationCapReached { max: u32 },

    /// The turn ended — the terminal event for every turn, success or
    /// failure. Hosts drain the bus until they see this.
    TurnComplete { reason: TurnEndReason },

    /// A non-fatal problem worth surfacing (JSON repair applied, malformed
    /// tool-call-in-prose detected, etc.).
    Warning { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TurnEndReason {
    /// A loop-breaking tool (`task_completion`, `converse`) was called.
    LoopBreakingTool { tool_name: String },
    IterationCapReached,
    CircuitBreakerTripped,
    ProviderError { message: String },
    /// A `<tool>...</tool>` payload exceeded the configured byte limit.
    /// Fatal: the model cannot be asked to retry a payload that is by
    /// definition too large to have been validly parsed.
    OversizedToolCall { limit: usize },
    /// The host requested the turn stop at the next safe point.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_complete_serializes_with_tagged_reason() {
        let event = AgentEvent::TurnComplete {
            reason: TurnEndReason::LoopBreakingTool {
                tool_name: "task_completion".into(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"turn_complete\""));
        assert!(json.contains("\"reason\":\"loop_breaking_tool\""));
    }

    #[test]
    fn approval_decision_variants_are_distinct() {
        assert_ne!(ApprovalDecision::Approved, ApprovalDecision::Denied);
        assert_ne!(ApprovalDecision::Denied, ApprovalDecision::TimedOut);
    }
}
