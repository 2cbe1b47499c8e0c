// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::Message;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    RequestFailed(String),
    #[error("provider stream ended unexpectedly: {0}")]
    StreamClosed(String),
}

/// A raw chunk of assistant output. The provider does not parse
/// `<thinking>`/`<tool>` spans — that happens downstream in the streaming
/// parser. Chunks may split a tag arbitrarily, including mid-name.
pub type TextChunk = String;

pub type ChunkStream = BoxStream<'static, Result<TextChunk, ProviderError>>;

/// External collaborator: turns a conversation into model output.
///
/// Implementations own all provider-specific request shaping (model name,
/// sampling parameters, retries). This trait only asks for one thing:
/// given the messages so far, produce assistant text — either all at once
/// or as a stream of chunks.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Non-streaming completion. Most callers should prefer [`Self::stream`];
    /// this exists for providers/tests where chunked delivery isn't needed.
    async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError>;

    /// Streaming completion. The returned stream yields chunks in order;
    /// concatenating all `Ok` items reproduces the same text `complete`
    /// would have returned for the same input.
    async fn stream(&self, messages: &[Message]) -> Result<ChunkStream, ProviderError>;

    /// Optional real input-token count for the most recent request, used to
    /// calibrate the chars/4 estimate (`agent-core`'s calibration hook).
    /// Returns `None` when the provider doesn't report usage.
    fn last_input_tokens(&self) -> Option<usize> {
        None
    }
}
