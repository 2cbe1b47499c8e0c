// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Recovery for models that emit slightly malformed JSON inside a `<tool>`
//! span, so a cosmetic mistake doesn't fail the whole turn.

use serde_json::Value;

/// Attempt to repair common JSON syntax errors and parse the result.
///
/// Tries, in order: fixing invalid in-string escape sequences, inserting a
/// missing comma between adjacent key-value pairs, and closing an abruptly
/// truncated object. Returns the first repair that parses.
pub fn attempt_json_repair(json_str: &str) -> Result<Value, String> {
    let fixed = fix_invalid_json_escapes(json_str);
    if let Ok(v) = serde_json::from_str::<Value>(&fixed) {
        return Ok(v);
    }

    let repaired = regex::Regex::new(r#""([^"]+)"([a-zA-Z_][a-zA-Z0-9_]*)":\s*"#)
        .unwrap()
        .replace_all(&fixed, r#""$1", "$2": "#);
    if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
        return Ok(v);
    }

    if !fixed.trim().ends_with('}') {
        let mut completed = fixed.clone();
        let quote_count = fixed.chars().filter(|&c| c == '"').count();
        if quote_count % 2 == 1 {
            completed.push('"');
        }
        if !completed.trim().ends_with('}') {
            completed.push('}');
        }
        if let Ok(v) = serde_json::from_str::<Value>(&completed) {
            return Ok(v);
        }
    }

    Err("JSON repair failed: all repair strategies exhausted".to_string())
}

/// Replace invalid JSON escape sequences inside string values (`\c`, `\p`,
/// ...) with a properly escaped backslash so the text round-trips through
/// `serde_json` without a parse error.
fn fix_invalid_json_escapes(json_str: &str) -> String {
    let mut result = String::with_capacity(json_str.len() + 16);
    let mut chars = json_str.chars();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => match chars.next() {
                    Some(next)
                        if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') =>
                    {
                        result.push('\\');
                        result.push(next);
                    }
                    Some(next) => {
                        result.push('\\');
                        result.push('\\');
                        result.push(next);
                    }
                    None => result.push('\\'),
                },
                '"' => {
                    in_string = false;
                    result.push('"');
                }
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }
    result
}

/// Return true when `text` contains tool-call markup a model wrote directly
/// into the text stream instead of emitting the structured `<tool>` span —
/// some fine-tuned models fall back to XML- or Hermes-style function-call
/// syntax.
pub fn text_contains_malformed_tool_call(text: &str) -> bool {
    text.contains("<tool_call>")
        || text.contains("</tool_call>")
        || text.contains("<function=")
        || text.contains("[TOOL_CALL]")
}
