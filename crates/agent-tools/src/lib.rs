// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Tool trait, registry, command whitelist, argument validation, and the
//! built-in tools the agent loop needs to be end-to-end runnable.

pub mod builtin;
mod events;
mod registry;
mod schema_validate;
mod tool;
mod whitelist;

pub use events::ToolEvent;
pub use registry::{ToolRegistry, ToolSchema};
pub use schema_validate::{validate, ValidationError};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};
pub use whitelist::CommandWhitelist;
