// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// A tool schema handed to the model as part of the system preamble.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

// SAFETY: ToolRegistry is Sync because:
// - HashMap<String, Arc<dyn Tool>> is Sync (String is Sync, Arc<T: Send + Sync> is Sync)
// - Tools implement Send + Sync (required by the Tool trait)
// - No interior mutability exists after construction (all methods take &self)
unsafe impl Sync for ToolRegistry {}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers `tool`. Panics if a tool with the same name is already
    /// registered — duplicate registration is a startup-time programmer
    /// error, not a runtime condition to recover from.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            panic!("tool \"{name}\" is already registered");
        }
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => ToolOutput::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
