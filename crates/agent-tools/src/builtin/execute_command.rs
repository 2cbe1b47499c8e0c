// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const OUTPUT_LIMIT: usize = 100_000;

/// Runs a shell command with streamed stdout/stderr and cooperative
/// cancellation — the one tool in this workspace whose execution the
/// Tool Dispatcher can interrupt mid-flight.
pub struct ExecuteCommandTool {
    pub default_timeout: Duration,
}

impl ExecuteCommandTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for ExecuteCommandTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Executes a shell command. Output is streamed line by line as it is \
         produced and is limited to 100,000 characters total. Default timeout \
         is 30 seconds; set timeout_secs for longer-running commands. \
         Non-zero exit codes are reported as errors."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "workdir": {
                    "type": "string",
                    "description": "Working directory (optional, defaults to cwd)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Execution timeout in seconds (optional)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn is_previewable(&self) -> bool {
        true
    }

    fn is_streamable(&self) -> bool {
        true
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    fn preview(&self, call: &ToolCall) -> String {
        call.args
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("(no command)")
            .to_string()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        self.execute_streaming(call, CancellationToken::new(), &|_| {})
            .await
    }

    async fn execute_streaming(
        &self,
        call: &ToolCall,
        cancel: CancellationToken,
        on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> ToolOutput {
        let command = match call.args.get("command").and_then(Value::as_str) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'command' argument"),
        };
        let workdir = call
            .args
            .get("workdir")
            .and_then(Value::as_str)
            .map(str::to_string);
        let timeout = call
            .args
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        debug!(cmd = %command, "execute_command tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(wd) = &workdir {
            cmd.current_dir(wd);
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("spawn error: {e}")),
        };

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut collected = String::new();
        let mut truncated = false;

        let run = async {
            loop {
                tokio::select! {
                    line = stdout_lines.next_line() => {
                        match line {
                            Ok(Some(l)) => {
                                on_chunk(l.clone());
                                push_bounded(&mut collected, &l, &mut truncated);
                            }
                            Ok(None) => {}
                            Err(_) => break,
                        }
                    }
                    line = stderr_lines.next_line() => {
                        match line {
                            Ok(Some(l)) => {
                                let tagged = format!("[stderr] {l}");
                                on_chunk(tagged.clone());
                                push_bounded(&mut collected, &tagged, &mut truncated);
                            }
                            Ok(None) => {}
                            Err(_) => break,
                        }
                    }
                    status = child.wait() => {
                        return status;
                    }
                }
            }
            child.wait().await
        };

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return ToolOutput::err(&call.id, format!("[cancelled]\n{collected}"));
            }
            status = tokio::time::timeout(timeout, run) => {
                match status {
                    Ok(Ok(status)) => status,
                    Ok(Err(e)) => return ToolOutput::err(&call.id, format!("wait error: {e}")),
                    Err(_) => {
                        let _ = child.start_kill();
                        return ToolOutput::err(&call.id, format!("timeout after {}s", timeout.as_secs()));
                    }
                }
            }
        };

        if truncated {
            collected.push_str("\n[output truncated]");
        }
        if collected.is_empty() {
            collected = format!("[exit {}]", status.code().unwrap_or(-1));
        }

        if status.success() {
            ToolOutput::ok(&call.id, collected)
        } else {
            let code = status.code().unwrap_or(-1);
            ToolOutput::err(&call.id, format!("[exit {code}]\n{collected}"))
        }
    }
}

fn push_bounded(collected: &mut String, line: &str, truncated: &mut bool) {
    if collected.len() >= OUTPUT_LIMIT {
        *truncated = true;
        return;
    }
    if !collected.is_empty() {
        collected.push('\n');
    }
    collected.push_str(line);
}
