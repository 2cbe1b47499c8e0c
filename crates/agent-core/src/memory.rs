// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use agent_model::{Message, Role};

/// Append-only ordered log of every message in the conversation (C2).
///
/// `snapshot()` returns a defensive copy so callers (the model provider,
/// the compactor) can read the history without holding a borrow across an
/// `.await`. Token accounting uses the chars/4 approximation, optionally
/// corrected by [`ConversationMemory::update_calibration`] against a
/// provider's real input-token count.
#[derive(Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    token_count: usize,
    calibration_factor: f32,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            token_count: 0,
            calibration_factor: 1.0,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.token_count += message.approx_tokens();
        self.messages.push(message);
    }

    pub fn push_many(&mut self, messages: impl IntoIterator<Item = Message>) {
        for m in messages {
            self.push(m);
        }
    }

    /// A defensive copy of the full history, in order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages whose role matches `role`, in original order.
    pub fn filter_by_role(&self, role: Role) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| std::mem::discriminant(&m.role) == std::mem::discriminant(&role))
            .cloned()
            .collect()
    }

    /// Calibrated token estimate: the raw chars/4 sum scaled by the running
    /// calibration factor.
    pub fn token_count(&self) -> usize {
        ((self.token_count as f32) * self.calibration_factor) as usize
    }

    pub fn context_fraction(&self, max_tokens: usize) -> f32 {
        if max_tokens == 0 {
            return 0.0;
        }
        (self.token_count() as f32) / (max_tokens as f32)
    }

    /// Atomically replace the entire message list (used by the compactor to
    /// install a summary in place of the groups it condensed).
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.recalculate();
    }

    fn recalculate(&mut self) {
        self.token_count = self.messages.iter().map(Message::approx_tokens).sum();
    }

    /// Correct the chars/4 approximation against a provider's reported
    /// actual input-token count for the most recent request, using an
    /// exponential moving average so a single noisy sample doesn't swing
    /// the estimate. Defaults to a no-op (factor stays 1.0) when the
    /// provider never reports usage.
    pub fn update_calibration(&mut self, actual_tokens: usize, estimated_tokens: usize) {
        if estimated_tokens == 0 {
            return;
        }
        let sample = actual_tokens as f32 / estimated_tokens as f32;
        const ALPHA: f32 = 0.2;
        self.calibration_factor = ALPHA * sample + (1.0 - ALPHA) * self.calibration_factor;
    }

    /// Drop the oldest non-system messages, one at a time, until the
    /// approximate token estimate falls at or below `max_tokens`. Every
    /// system message is preserved regardless of age or budget — if the
    /// system messages alone exceed `max_tokens`, every non-system message
    /// is dropped and the budget is still exceeded.
    pub fn prune(&mut self, max_tokens: usize) {
        let system: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.role.is_system())
            .cloned()
            .collect();
        let mut non_system: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| !m.role.is_system())
            .cloned()
            .collect();
        let system_tokens: usize = system.iter().map(Message::approx_tokens).sum();

        while !non_system.is_empty() {
            let non_system_tokens: usize = non_system.iter().map(Message::approx_tokens).sum();
            if system_tokens + non_system_tokens <= max_tokens {
                break;
            }
            non_system.remove(0);
        }

        let mut pruned = system;
        pruned.extend(non_system);
        self.replace(pruned);
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}
