// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod calculator;
mod converse;
mod execute_command;
mod task_completion;

pub use calculator::CalculatorTool;
pub use converse::ConverseTool;
pub use execute_command::ExecuteCommandTool;
pub use task_completion::TaskCompletionTool;
