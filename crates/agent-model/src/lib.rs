// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Wire-independent message model and the `ModelProvider` external
//! collaborator trait.

mod mock;
mod provider;
mod types;

pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::{ChunkStream, ModelProvider, ProviderError, TextChunk};
pub use types::{Message, Role};
