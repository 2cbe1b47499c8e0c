// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_iterations() -> u32 {
    10
}
fn default_approval_timeout_secs() -> u64 {
    5 * 60
}
fn default_command_default_timeout_secs() -> u64 {
    30
}
fn default_breaker_window() -> usize {
    5
}
fn default_fresh_window() -> usize {
    20
}
fn default_buffer_min() -> usize {
    10
}
fn default_max_age() -> usize {
    40
}
fn default_max_tokens() -> usize {
    100_000
}
fn default_prune_threshold_percent() -> f32 {
    80.0
}
fn default_tool_xml_max_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_tool_result_max_tokens() -> usize {
    2_000
}
fn default_excluded_tools() -> Vec<String> {
    vec!["task_completion".into(), "converse".into()]
}

/// One entry in the command whitelist.  `pattern` is matched against the
/// start of a shell command with a space boundary: `pattern` matches
/// `pattern` or `pattern ...` but not `patternabc`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandWhitelistEntry {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

/// Compaction checkpoint format.  See [`crate::AgentConfig::compaction_strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStrategy {
    #[default]
    Structured,
    Narrative,
}

/// Context-compaction knobs (C7).  Mirrors the `context.*` keys in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Messages in the tail that are never touched by compaction.
    #[serde(default = "default_fresh_window")]
    pub fresh_window: usize,
    /// Minimum candidate groups before summarization fires.
    #[serde(default = "default_buffer_min")]
    pub buffer_min: usize,
    /// Force-summarize when the oldest candidate group exceeds this age
    /// (measured in messages).
    #[serde(default = "default_max_age")]
    pub max_age: usize,
    /// Tool names whose (assistant tool-call, tool result) groups are never
    /// summarized — preserved verbatim in their original relative order.
    #[serde(default = "default_excluded_tools")]
    pub excluded_tools: Vec<String>,
    /// Narrative vs. structured checkpoint prompt.
    #[serde(default)]
    pub strategy: CompactionStrategy,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            fresh_window: default_fresh_window(),
            buffer_min: default_buffer_min(),
            max_age: default_max_age(),
            excluded_tools: default_excluded_tools(),
            strategy: CompactionStrategy::default(),
        }
    }
}

/// All configuration knobs for the agent loop core (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reason→act→observe iterations per turn before the iteration
    /// cap fires.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// How long the Approval Manager waits for a user decision before
    /// treating the request as timed out.
    #[serde(
        default = "default_approval_timeout_secs",
        rename = "approval_timeout_secs"
    )]
    pub approval_timeout_secs: u64,

    /// Default per-invocation timeout for `execute_command`, overridable per
    /// call.
    #[serde(
        default = "default_command_default_timeout_secs",
        rename = "command_default_timeout_secs"
    )]
    pub command_default_timeout_secs: u64,

    /// Width of the circuit-breaker ring (number of consecutive matching
    /// error signatures required to trip).
    #[serde(default = "default_breaker_window")]
    pub breaker_window: usize,

    /// Context-compaction (C7) parameters.
    #[serde(default)]
    pub context: CompactionConfig,

    /// Tool names that skip the Approval Manager entirely regardless of
    /// whitelist matching.
    #[serde(default)]
    pub auto_approved_tools: Vec<String>,

    /// Prefix-matched commands that skip user approval for `execute_command`.
    #[serde(default)]
    pub command_whitelist: Vec<CommandWhitelistEntry>,

    /// Approximate token budget for the conversation (chars/4 estimate).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Percentage of `max_tokens` at which `ConversationMemory::prune` is
    /// triggered proactively by the caller.
    #[serde(default = "default_prune_threshold_percent")]
    pub prune_threshold_percent: f32,

    /// Maximum size, in bytes, of a single `<tool>...</tool>` payload before
    /// the Streaming Parser reports `Oversized`.
    #[serde(default = "default_tool_xml_max_bytes")]
    pub tool_xml_max_bytes: usize,

    /// Approximate token cap applied to a single tool result before it is
    /// appended to conversation memory (category-aware, see
    /// `agent_core::truncation::smart_truncate`).
    #[serde(default = "default_tool_result_max_tokens")]
    pub tool_result_max_tokens: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            approval_timeout_secs: default_approval_timeout_secs(),
            command_default_timeout_secs: default_command_default_timeout_secs(),
            breaker_window: default_breaker_window(),
            context: CompactionConfig::default(),
            auto_approved_tools: Vec::new(),
            command_whitelist: Vec::new(),
            max_tokens: default_max_tokens(),
            prune_threshold_percent: default_prune_threshold_percent(),
            tool_xml_max_bytes: default_tool_xml_max_bytes(),
            tool_result_max_tokens: default_tool_result_max_tokens(),
        }
    }
}

impl AgentConfig {
    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    pub fn command_default_timeout(&self) -> Duration {
        Duration::from_secs(self.command_default_timeout_secs)
    }

    /// Token count at which proactive pruning should be attempted
    /// (`max_tokens * prune_threshold_percent / 100`).
    pub fn prune_threshold_tokens(&self) -> usize {
        ((self.max_tokens as f32) * (self.prune_threshold_percent / 100.0)) as usize
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = AgentConfig::default();
        assert_eq!(c.max_iterations, 10);
        assert_eq!(c.approval_timeout_secs, 300);
        assert_eq!(c.command_default_timeout_secs, 30);
        assert_eq!(c.breaker_window, 5);
        assert_eq!(c.context.fresh_window, 20);
        assert_eq!(c.context.buffer_min, 10);
        assert_eq!(c.context.max_age, 40);
        assert_eq!(c.max_tokens, 100_000);
        assert_eq!(c.prune_threshold_percent, 80.0);
        assert_eq!(c.tool_xml_max_bytes, 10 * 1024 * 1024);
        assert_eq!(c.tool_result_max_tokens, 2_000);
    }

    #[test]
    fn prune_threshold_tokens_computed_from_percent() {
        let mut c = AgentConfig::default();
        c.max_tokens = 1000;
        c.prune_threshold_percent = 50.0;
        assert_eq!(c.prune_threshold_tokens(), 500);
    }

    #[test]
    fn deserializes_partial_toml_with_defaults() {
        let toml_str = r#"
            max_iterations = 3
        "#;
        let c: AgentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(c.max_iterations, 3);
        assert_eq!(c.breaker_window, 5); // default retained
    }

    #[test]
    fn command_whitelist_entry_roundtrips() {
        let e = CommandWhitelistEntry {
            pattern: "git status".into(),
            description: "read-only git status".into(),
        };
        let s = serde_json::to_string(&e).unwrap();
        let back: CommandWhitelistEntry = serde_json::from_str(&s).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn compaction_strategy_default_is_structured() {
        assert_eq!(CompactionStrategy::default(), CompactionStrategy::Structured);
    }
}
