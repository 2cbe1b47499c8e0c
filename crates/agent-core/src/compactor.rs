// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Context Compactor (C7): summarize old tool-call/result exchanges to
//! reclaim context budget.
//!
//! Grounded on the teacher's `compact::compact_session_with_strategy` and
//! `emergency_compact`, generalized from "replace the whole history with one
//! summarization request" to the spec's finer-grained group-at-a-time
//! design: contiguous (assistant-with-tool-call, tool-result) pairs in the
//! region older than `fresh_window` are summarized individually and
//! concurrently, while pairs naming an excluded tool are preserved verbatim.
use agent_config::{CompactionConfig, CompactionStrategy};
use agent_model::{Message, ModelProvider, Role};
use futures::future::join_all;

use crate::bus::EventBus;
use crate::error::AgentError;
use crate::events::AgentEvent;

const STRUCTURED_GROUP_SUMMARY_PROMPT: &str = "Produce a structured one-line checkpoint \
     of this tool exchange using the form `tool=<name> reason=<why> outcome=<what happened>`. \
     Be information-dense: preserve file paths, identifiers, and error messages verbatim.";

const NARRATIVE_GROUP_SUMMARY_PROMPT: &str = "Summarize in 2-3 sentences: which tool, why, key \
     arguments, outcome. Be dense and factual.";

const NARRATIVE_EMERGENCY_NOTICE: &str = "[Context emergency-compacted: earlier history \
     was dropped to prevent a context-window overflow. The agent may lack full context \
     for earlier decisions. Proceed carefully and ask the user to re-provide any missing \
     requirements if needed.]";

struct Group {
    start: usize,
    tool_name: String,
    assistant: Message,
    tool_result: Message,
}

pub struct Compactor {
    config: CompactionConfig,
}

impl Compactor {
    pub fn new(config: CompactionConfig) -> Self {
        Self { config }
    }

    /// Whether compaction should run now, per spec.md §4.7's trigger: either
    /// enough candidate groups have accumulated, or the oldest one has aged
    /// past `max_age` messages.
    pub fn should_compact(&self, messages: &[Message]) -> bool {
        let groups = self.candidate_groups(messages);
        if groups.len() >= self.config.buffer_min {
            return true;
        }
        match groups.first() {
            Some(oldest) => messages.len().saturating_sub(oldest.start) > self.config.max_age,
            None => false,
        }
    }

    /// Contiguous (assistant tool-call, tool result) pairs in the region
    /// older than `fresh_window`, excluding any whose tool name is listed in
    /// `excluded_tools`. The assistant message in a pair must carry
    /// `metadata.tool_name`, set by the Iteration Controller when it
    /// persists the tool-calling turn.
    fn candidate_groups(&self, messages: &[Message]) -> Vec<Group> {
        let old_region_end = messages.len().saturating_sub(self.config.fresh_window);
        let mut groups = Vec::new();
        let mut i = 0;
        while i + 1 < old_region_end {
            let a = &messages[i];
            let b = &messages[i + 1];
            if a.role == Role::Assistant && b.role == Role::Tool {
                if let Some(tool_name) = a
                    .metadata
                    .get("tool_name")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                {
                    if !self.config.excluded_tools.contains(&tool_name) {
                        groups.push(Group {
                            start: i,
                            tool_name,
                            assistant: a.clone(),
                            tool_result: b.clone(),
                        });
                    }
                    i += 2;
                    continue;
                }
            }
            i += 1;
        }
        groups
    }

    /// Run compaction: summarize every candidate group concurrently, then
    /// atomically reconstruct the message list as system messages →
    /// preserved excluded-tool groups (original order) → group summaries →
    /// the untouched `fresh_window` tail. Leaves `messages` unchanged if any
    /// individual summarization request fails.
    pub async fn compact(
        &self,
        messages: &[Message],
        provider: &dyn ModelProvider,
        bus: &mut EventBus,
    ) -> Result<Vec<Message>, AgentError> {
        let groups = self.candidate_groups(messages);
        if groups.is_empty() {
            return Ok(messages.to_vec());
        }
        bus.publish(AgentEvent::CompactionStarted {
            groups: groups.len(),
        })
        .await;

        let prompt_template = match self.config.strategy {
            CompactionStrategy::Structured => STRUCTURED_GROUP_SUMMARY_PROMPT,
            CompactionStrategy::Narrative => NARRATIVE_GROUP_SUMMARY_PROMPT,
        };

        let total = groups.len();
        let futures = groups.iter().enumerate().map(|(idx, group)| {
            let prompt = format!(
                "{prompt_template}\n\nTool: {}\nCall: {}\nResult: {}",
                group.tool_name, group.assistant.content, group.tool_result.content
            );
            async move {
                let summary = provider.complete(&[Message::user(prompt)]).await?;
                Ok::<(usize, String), AgentError>((idx, summary))
            }
        });

        let mut summaries: Vec<Option<String>> = vec![None; total];
        for (done, result) in join_all(futures).await.into_iter().enumerate() {
            let (idx, summary) = result?;
            summaries[idx] = Some(summary);
            bus.publish(AgentEvent::SummarizationProgress {
                done: done + 1,
                total,
            })
            .await;
        }

        let old_region_end = messages.len().saturating_sub(self.config.fresh_window);
        let mut excluded_indices = std::collections::HashSet::new();
        for g in &groups {
            excluded_indices.insert(g.start);
            excluded_indices.insert(g.start + 1);
        }

        let system: Vec<Message> = messages.iter().filter(|m| m.role.is_system()).cloned().collect();
        let preserved: Vec<Message> = messages[..old_region_end]
            .iter()
            .enumerate()
            .filter(|(i, m)| !m.role.is_system() && !excluded_indices.contains(i))
            .map(|(_, m)| m.clone())
            .collect();
        let summary_messages: Vec<Message> = groups
            .iter()
            .zip(summaries.into_iter())
            .map(|(g, s)| {
                Message::assistant(format!(
                    "[summarized {}]: {}",
                    g.tool_name,
                    s.expect("every group has a summary at this point")
                ))
                .with_metadata("summarized", serde_json::json!(true))
            })
            .collect();
        let tail: Vec<Message> = messages[old_region_end..].to_vec();

        let mut rebuilt = Vec::with_capacity(system.len() + preserved.len() + summary_messages.len() + tail.len());
        rebuilt.extend(system);
        rebuilt.extend(preserved);
        rebuilt.extend(summary_messages);
        rebuilt.extend(tail);

        bus.publish(AgentEvent::CompactionCompleted {
            messages_before: messages.len(),
            messages_after: rebuilt.len(),
        })
        .await;

        Ok(rebuilt)
    }

    pub fn strategy(&self) -> CompactionStrategy {
        self.config.strategy
    }
}

/// Deterministic, model-free fallback used when the session is too large to
/// fit even a compaction prompt in the context window. Drops all but the
/// last `keep_n` non-system messages and prepends a canned notice.
pub fn emergency_compact(messages: &[Message], keep_n: usize) -> Vec<Message> {
    let system: Vec<Message> = messages.iter().filter(|m| m.role.is_system()).cloned().collect();
    let non_system: Vec<Message> = messages.iter().filter(|m| !m.role.is_system()).cloned().collect();
    let keep = keep_n.min(non_system.len());
    let preserved = non_system[non_system.len() - keep..].to_vec();

    let mut rebuilt = system;
    rebuilt.push(Message::assistant(NARRATIVE_EMERGENCY_NOTICE));
    rebuilt.extend(preserved);
    rebuilt
}
