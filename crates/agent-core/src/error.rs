// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Errors raised anywhere in the agent loop.
///
/// Every variant that participates in the circuit breaker's error-signature
/// ring carries enough information for [`crate::controller::error_signature`]
/// to classify it; see that function for the canonical signature strings.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model provider error: {0}")]
    Provider(#[from] agent_model::ProviderError),

    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("tool payload exceeded {limit} bytes")]
    Oversized { limit: usize },

    #[error("unsupported server_name: {0}")]
    UnsupportedServer(String),

    #[error("tool dispatch failed for '{tool}': {message}")]
    ToolDispatch { tool: String, message: String },

    #[error("argument validation failed for '{tool}': {errors:?}")]
    ArgumentValidation { tool: String, errors: Vec<String> },

    #[error("approval request '{approval_id}' timed out")]
    ApprovalTimeout { approval_id: String },

    #[error("approval request '{approval_id}' was denied")]
    ApprovalDenied { approval_id: String },

    #[error("iteration cap of {max} reached without a loop-breaking tool call")]
    IterationCapReached { max: u32 },

    #[error("circuit breaker tripped after {window} consecutive matching errors")]
    CircuitBreakerTripped { window: usize },

    #[error("compaction failed: {0}")]
    Compaction(String),

    #[error("internal error: {0}")]
    Internal(String),
}
