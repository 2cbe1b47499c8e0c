// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;

use crate::provider::{ChunkStream, ModelProvider, ProviderError};
use crate::types::Message;

/// Always returns the same fixed text, as a single chunk. Useful for tests
/// that don't care about chunk boundaries.
pub struct MockProvider {
    response: String,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, _messages: &[Message]) -> Result<String, ProviderError> {
        Ok(self.response.clone())
    }

    async fn stream(&self, _messages: &[Message]) -> Result<ChunkStream, ProviderError> {
        let chunk = self.response.clone();
        Ok(stream::iter(vec![Ok(chunk)]).boxed())
    }
}

/// A queue of scripted responses, each response itself a list of chunks
/// (so tests can exercise tag-split-across-chunk-boundary behavior). One
/// call to `complete`/`stream` consumes one scripted response; calling past
/// the end of the script repeats the last response.
pub struct ScriptedMockProvider {
    scripts: Mutex<Vec<Vec<String>>>,
    cursor: Mutex<usize>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Vec<String>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            cursor: Mutex::new(0),
        }
    }

    /// A single response, delivered as one chunk.
    pub fn always_text(text: impl Into<String>) -> Self {
        Self::new(vec![vec![text.into()]])
    }

    /// First turn emits a `<tool>` call, second turn plain text — the
    /// canonical "one tool call then finish" script used across spec.md §8.
    pub fn tool_then_text(tool_xml: impl Into<String>, final_text: impl Into<String>) -> Self {
        Self::new(vec![vec![tool_xml.into()], vec![final_text.into()]])
    }

    fn next_script(&self) -> Vec<String> {
        let scripts = self.scripts.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        let idx = (*cursor).min(scripts.len().saturating_sub(1));
        *cursor += 1;
        scripts.get(idx).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    async fn complete(&self, _messages: &[Message]) -> Result<String, ProviderError> {
        Ok(self.next_script().concat())
    }

    async fn stream(&self, _messages: &[Message]) -> Result<ChunkStream, ProviderError> {
        let chunks: Vec<Result<String, ProviderError>> =
            self.next_script().into_iter().map(Ok).collect();
        Ok(stream::iter(chunks).boxed())
    }
}
