// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool's observation, fed back to the model as the next turn's input.
    Tool,
}

impl Role {
    pub fn is_system(&self) -> bool {
        matches!(self, Role::System)
    }
}

/// A single entry in the conversation log (§4.2 of spec.md).
///
/// `content` is always plain text. Tool-call spans and thinking spans that
/// the model emitted are stripped out by the streaming parser before a
/// message is appended here — what's stored is the user-visible prose plus,
/// for tool messages, the serialized result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Rough token estimate used throughout `agent-core` (chars/4), matching
    /// the teacher's session accounting.
    pub fn approx_tokens(&self) -> usize {
        self.content.len() / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_tokens_is_chars_over_four() {
        let m = Message::user("abcdefgh");
        assert_eq!(m.approx_tokens(), 2);
    }

    #[test]
    fn with_metadata_inserts_key() {
        let m = Message::assistant("hi").with_metadata("iteration", Value::from(3));
        assert_eq!(m.metadata.get("iteration").unwrap(), &Value::from(3));
    }

    #[test]
    fn role_is_system_only_matches_system() {
        assert!(Role::System.is_system());
        assert!(!Role::User.is_system());
    }
}
