// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! The agent loop core: conversation memory, streaming tag parser, approval
//! gating, tool dispatch, iteration control, and context compaction.

pub mod approval;
pub mod bus;
pub mod compactor;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod json_repair;
pub mod memory;
pub mod parser;
pub mod prompts;
pub mod truncation;

pub use approval::{ApprovalManager, PolicyDecision};
pub use bus::{ApprovalResponse, CancellationRequest, EventBus, EventPublisher};
pub use compactor::{emergency_compact, Compactor};
pub use controller::IterationController;
pub use dispatcher::{DispatchOutcome, ToolDispatcher};
pub use error::AgentError;
pub use events::{AgentEvent, ApprovalDecision, TurnEndReason};
pub use memory::ConversationMemory;
pub use parser::{ParseEvent, StreamingParser, ToolCallEnvelope};
