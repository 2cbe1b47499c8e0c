// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A single tool invocation parsed out of a `<tool>` span by the streaming
/// parser.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Identifier assigned by the Tool Dispatcher, used to correlate the
    /// eventual `ToolResult`/`ToolResultError` event back to this call.
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// A single content item in a tool's output.
#[derive(Debug, Clone)]
pub enum ToolOutputPart {
    Text(String),
    /// Base64 data URL: `data:<mime>;base64,<b64>`.
    Image(String),
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    /// Plain-text content — concatenation of all `Text` parts. Always set.
    pub content: String,
    pub parts: Vec<ToolOutputPart>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let text = content.into();
        Self {
            call_id: call_id.into(),
            content: text.clone(),
            parts: vec![ToolOutputPart::Text(text)],
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let text = msg.into();
        Self {
            call_id: call_id.into(),
            content: text.clone(),
            parts: vec![ToolOutputPart::Text(text)],
            is_error: true,
        }
    }

    pub fn with_parts(call_id: impl Into<String>, parts: Vec<ToolOutputPart>) -> Self {
        let text = parts
            .iter()
            .filter_map(|p| match p {
                ToolOutputPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            call_id: call_id.into(),
            content: text,
            parts,
            is_error: false,
        }
    }

    pub fn has_images(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ToolOutputPart::Image(_)))
    }
}

/// Describes the shape of a tool's text output for context-aware truncation
/// (spec.md §C of SPEC_FULL.md, supplementary feature 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Terminal / process output: keep the first 60 + last 40 lines.
    HeadTail,
    /// Ordered match list: keep the leading matches.
    MatchList,
    /// Generic text: hard-truncate at the character boundary.
    #[default]
    Generic,
}

/// Trait every built-in tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for `arguments`.
    fn parameters_schema(&self) -> Value;

    /// A loop-breaking tool ends the current turn as soon as its result is
    /// reported — `task_completion` and `converse` are the two built-ins
    /// that set this. Everything else is `false`.
    fn is_loop_breaking(&self) -> bool {
        false
    }

    /// Whether the Approval Manager should render a human-readable preview
    /// before asking for approval (e.g. the command string for
    /// `execute_command`). Default: no preview beyond the raw arguments.
    fn is_previewable(&self) -> bool {
        false
    }

    /// Whether this tool streams incremental output and supports
    /// cancellation via [`Tool::execute_streaming`]. Only `execute_command`
    /// sets this today.
    fn is_streamable(&self) -> bool {
        false
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    /// Build a short, human-readable preview string shown to the user
    /// during approval. Only called when [`Tool::is_previewable`] is true.
    fn preview(&self, call: &ToolCall) -> String {
        call.args.to_string()
    }

    /// Execute the tool and produce a single, final result.
    async fn execute(&self, call: &ToolCall) -> ToolOutput;

    /// Execute the tool with incremental output and cooperative
    /// cancellation. Only meaningful when [`Tool::is_streamable`] is true;
    /// the default implementation delegates to [`Tool::execute`] and
    /// ignores the token.
    async fn execute_streaming(
        &self,
        call: &ToolCall,
        _cancel: CancellationToken,
        _on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> ToolOutput {
        self.execute(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MinimalTool;

    #[async_trait]
    impl Tool for MinimalTool {
        fn name(&self) -> &str {
            "minimal"
        }
        fn description(&self) -> &str {
            "a minimal tool"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "ok")
        }
    }

    #[test]
    fn output_category_default_is_generic() {
        assert_eq!(OutputCategory::default(), OutputCategory::Generic);
    }

    #[test]
    fn tool_defaults_are_non_loop_breaking_non_streaming() {
        let t = MinimalTool;
        assert!(!t.is_loop_breaking());
        assert!(!t.is_previewable());
        assert!(!t.is_streamable());
    }

    #[tokio::test]
    async fn execute_streaming_default_delegates_to_execute() {
        let t = MinimalTool;
        let call = ToolCall {
            id: "1".into(),
            name: "minimal".into(),
            args: json!({}),
        };
        let out = t
            .execute_streaming(&call, CancellationToken::new(), &|_| {})
            .await;
        assert_eq!(out.content, "ok");
    }

    #[test]
    fn tool_output_ok_and_err_roundtrip_content() {
        let ok = ToolOutput::ok("1", "done");
        assert!(!ok.is_error);
        assert_eq!(ok.content, "done");

        let err = ToolOutput::err("1", "boom");
        assert!(err.is_error);
        assert_eq!(err.content, "boom");
    }

    #[test]
    fn with_parts_joins_text_parts_and_detects_images() {
        let out = ToolOutput::with_parts(
            "1",
            vec![
                ToolOutputPart::Text("a".into()),
                ToolOutputPart::Image("data:image/png;base64,xx".into()),
                ToolOutputPart::Text("b".into()),
            ],
        );
        assert_eq!(out.content, "a\nb");
        assert!(out.has_images());
    }
}
