// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Evaluates a basic arithmetic expression: `+ - * /`, parentheses, unary
/// minus, and floating-point literals. No variables or functions — this
/// exists to give the end-to-end scenarios a deterministic, dependency-free
/// tool to exercise the single-tool-call path.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a basic arithmetic expression (+, -, *, /, parentheses). \
         Example: \"(2 + 3) * 4\"."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["expression"],
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate"
                }
            }
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let expr = match call.args.get("expression").and_then(Value::as_str) {
            Some(e) => e,
            None => return ToolOutput::err(&call.id, "missing 'expression' argument"),
        };

        match evaluate(expr) {
            Ok(result) => ToolOutput::ok(&call.id, format_result(result)),
            Err(e) => ToolOutput::err(&call.id, format!("evaluation error: {e}")),
        }
    }
}

fn format_result(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Recursive-descent evaluator: expr := term (('+' | '-') term)*
fn evaluate(input: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = parser.parse_expr()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(format!("unexpected trailing input at position {}", parser.pos));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, String> {
        let mut value = self.parse_unary()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    value *= self.parse_unary()?;
                }
                Some('/') => {
                    self.pos += 1;
                    let divisor = self.parse_unary()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.parse_unary()?)
            }
            Some('+') => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.skip_ws();
                if self.chars.get(self.pos) != Some(&')') {
                    return Err("expected closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) => Err(format!("unexpected character '{c}'")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_number(&mut self) -> Result<f64, String> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| format!("invalid number '{text}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evaluates_simple_addition() {
        let tool = CalculatorTool;
        let call = ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            args: json!({ "expression": "2 + 3" }),
        };
        let out = tool.execute(&call).await;
        assert_eq!(out.content, "5");
    }

    #[tokio::test]
    async fn respects_operator_precedence_and_parens() {
        let tool = CalculatorTool;
        let call = ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            args: json!({ "expression": "(2 + 3) * 4" }),
        };
        let out = tool.execute(&call).await;
        assert_eq!(out.content, "20");
    }

    #[tokio::test]
    async fn division_by_zero_is_reported_as_error() {
        let tool = CalculatorTool;
        let call = ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            args: json!({ "expression": "1 / 0" }),
        };
        let out = tool.execute(&call).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn unary_minus_is_supported() {
        let tool = CalculatorTool;
        let call = ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            args: json!({ "expression": "-5 + 10" }),
        };
        let out = tool.execute(&call).await;
        assert_eq!(out.content, "5");
    }

    #[tokio::test]
    async fn malformed_expression_is_an_error() {
        let tool = CalculatorTool;
        let call = ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            args: json!({ "expression": "2 + " }),
        };
        let out = tool.execute(&call).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn missing_expression_argument_is_an_error() {
        let tool = CalculatorTool;
        let call = ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            args: json!({}),
        };
        let out = tool.execute(&call).await;
        assert!(out.is_error);
    }

    #[test]
    fn fractional_results_keep_decimal_formatting() {
        assert_eq!(format_result(2.5), "2.5");
        assert_eq!(format_result(4.0), "4");
    }
}
