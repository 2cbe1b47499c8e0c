// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration knobs for the agent loop core.

mod loader;
mod schema;

pub use loader::AgentConfigError;
pub use schema::{AgentConfig, CommandWhitelistEntry, CompactionConfig, CompactionStrategy};
