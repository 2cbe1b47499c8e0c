// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Events emitted by tools while they run, separate from their final
//! `ToolOutput`. `agent-core`'s dispatcher forwards these onto the event bus
//! as `AgentEvent::CommandOutput`.

/// One line of incremental output from a streaming tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEvent {
    /// A line written to stdout.
    Stdout(String),
    /// A line written to stderr.
    Stderr(String),
}
