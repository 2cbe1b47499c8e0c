// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::Value;

use crate::json_repair::attempt_json_repair;

const OPEN_THINKING: &str = "<thinking>";
const CLOSE_THINKING: &str = "</thinking>";
const OPEN_TOOL: &str = "<tool>";
const CLOSE_TOOL: &str = "</tool>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Plain,
    InThinking,
    InTool,
}

/// A fully decoded `<tool>` span.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallEnvelope {
    pub server_name: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// One unit of output from feeding a chunk to the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// User-visible prose, outside any tag.
    Text(String),
    /// Content of a `<thinking>...</thinking>` span.
    Thinking(String),
    /// A complete, decoded tool call.
    ToolCall(ToolCallEnvelope),
    /// A `<tool>` span failed to decode as JSON even after the repair pass.
    InvalidToolJson { raw: String, error: String },
    /// `server_name` was present but not `"local"`.
    UnsupportedServer { server_name: String },
    /// A `<tool>` span exceeded the configured byte cap before closing.
    Oversized { limit: usize },
}

/// Streaming `<thinking>`/`<tool>` tag-state machine.
///
/// Feed it chunks in order via [`StreamingParser::feed`]; it buffers any
/// trailing bytes that might be the prefix of a tag so a closing tag split
/// across a chunk boundary is never missed and partially-tagged content is
/// never leaked early. Call [`StreamingParser::finish`] once the stream
/// ends to flush whatever is left as plain content.
///
/// Three invariants hold regardless of how the input is chunked:
/// 1. Concatenating every `Text`/`Thinking` event's payload, in order,
///    reproduces the untagged portions of the input exactly.
/// 2. A `<tool>` span is only ever reported once, atomically, on its
///    closing tag — never partially.
/// 3. Feeding the same logical input split at different chunk boundaries
///    produces the same sequence of events.
pub struct StreamingParser {
    state: State,
    pending: String,
    tool_buf: String,
    max_tool_bytes: usize,
}

impl StreamingParser {
    pub fn new(max_tool_bytes: usize) -> Self {
        Self {
            state: State::Plain,
            pending: String::new(),
            tool_buf: String::new(),
            max_tool_bytes,
        }
    }

    /// Feed one chunk of raw provider output, returning every event that
    /// could be committed as a result.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParseEvent> {
        self.pending.push_str(chunk);
        let mut events = Vec::new();
        loop {
            if !self.step(&mut events) {
                break;
            }
        }
        events
    }

    /// Flush any buffered content once the stream has ended. An unterminated
    /// `<thinking>` or `<tool>` span at end-of-stream is flushed as whatever
    /// partial content it held plain (best-effort; the model's output was
    /// truncated).
    pub fn finish(&mut self) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        if !self.pending.is_empty() {
            match self.state {
                State::Plain => events.push(ParseEvent::Text(std::mem::take(&mut self.pending))),
                State::InThinking => {
                    events.push(ParseEvent::Thinking(std::mem::take(&mut self.pending)))
                }
                State::InTool => {
                    self.tool_buf.push_str(&self.pending);
                    self.pending.clear();
                    events.push(ParseEvent::InvalidToolJson {
                        raw: std::mem::take(&mut self.tool_buf),
                        error: "stream ended before </tool>".to_string(),
                    });
                }
            }
        }
        self.state = State::Plain;
        events
    }

    /// Process as much of `self.pending` as can be safely committed given
    /// the current state. Returns `true` if progress was made (caller
    /// should loop again), `false` once nothing more can be done without
    /// more input.
    fn step(&mut self, events: &mut Vec<ParseEvent>) -> bool {
        let candidates: &[&str] = match self.state {
            State::Plain => &[OPEN_THINKING, OPEN_TOOL],
            State::InThinking => &[CLOSE_THINKING],
            State::InTool => &[CLOSE_TOOL],
        };

        if let Some((idx, tag)) = find_earliest(&self.pending, candidates) {
            let before = self.pending[..idx].to_string();
            let rest = self.pending[idx + tag.len()..].to_string();

            match self.state {
                State::Plain => {
                    if !before.is_empty() {
                        events.push(ParseEvent::Text(before));
                    }
                    self.state = if tag == OPEN_THINKING {
                        State::InThinking
                    } else {
                        State::InTool
                    };
                }
                State::InThinking => {
                    if !before.is_empty() {
                        events.push(ParseEvent::Thinking(before));
                    }
                    self.state = State::Plain;
                }
                State::InTool => {
                    self.tool_buf.push_str(&before);
                    events.push(self.decode_tool_call());
                    self.tool_buf.clear();
                    self.state = State::Plain;
                }
            }
            self.pending = rest;
            return true;
        }

        // No complete tag found: hold back any suffix that could be a
        // partial tag prefix, commit the rest.
        let (committed, held) = split_safe(&self.pending, candidates);
        if committed.is_empty() {
            return false;
        }
        let committed = committed.to_string();
        let held = held.to_string();

        match self.state {
            State::Plain => events.push(ParseEvent::Text(committed)),
            State::InThinking => events.push(ParseEvent::Thinking(committed)),
            State::InTool => {
                self.tool_buf.push_str(&committed);
                if self.tool_buf.len() > self.max_tool_bytes {
                    events.push(ParseEvent::Oversized {
                        limit: self.max_tool_bytes,
                    });
                    self.tool_buf.clear();
                    self.state = State::Plain;
                }
            }
        }
        self.pending = held;
        false
    }

    fn decode_tool_call(&self) -> ParseEvent {
        let raw = self.tool_buf.clone();
        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(v) => v,
            Err(e) => match attempt_json_repair(&raw) {
                Ok(v) => v,
                Err(_) => {
                    return ParseEvent::InvalidToolJson {
                        raw,
                        error: e.to_string(),
                    }
                }
            },
        };

        let server_name = value
            .get("server_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let tool_name = match value.get("tool_name").and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                return ParseEvent::InvalidToolJson {
                    raw,
                    error: "missing 'tool_name'".to_string(),
                }
            }
        };
        if server_name != "local" {
            return ParseEvent::UnsupportedServer { server_name };
        }
        let arguments = value.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));

        ParseEvent::ToolCall(ToolCallEnvelope {
            server_name,
            tool_name,
            arguments,
        })
    }
}

/// Find the earliest occurrence, across every candidate tag, in `s`.
/// Returns the byte index and the matched tag text.
fn find_earliest<'a>(s: &str, candidates: &[&'a str]) -> Option<(usize, &'a str)> {
    candidates
        .iter()
        .filter_map(|t| s.find(t).map(|idx| (idx, *t)))
        .min_by_key(|(idx, _)| *idx)
}

/// Split `s` into a committed prefix (safe to emit now) and a held-back
/// suffix that might be the start of one of `candidates` once more input
/// arrives. Every candidate tag is ASCII, so a suffix can only match a tag
/// prefix at an ASCII byte boundary — this never splits a multi-byte UTF-8
/// character.
fn split_safe<'a>(s: &'a str, candidates: &[&str]) -> (&'a str, &'a str) {
    let max_len = candidates.iter().map(|t| t.len()).max().unwrap_or(0);
    for k in (1..max_len).rev() {
        if s.len() < k {
            continue;
        }
        let suffix = &s[s.len() - k..];
        if candidates.iter().any(|t| t.as_bytes().starts_with(suffix.as_bytes()) && t.len() > k) {
            return (&s[..s.len() - k], suffix);
        }
    }
    (s, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> StreamingParser {
        StreamingParser::new(10 * 1024 * 1024)
    }

    // ── Plain text ───────────────────────────────────────────────────────

    #[test]
    fn plain_text_with_no_tags_passes_through() {
        let mut p = parser();
        let events = p.feed("hello world");
        let tail = p.finish();
        let all: Vec<_> = events.into_iter().chain(tail).collect();
        assert_eq!(all, vec![ParseEvent::Text("hello world".to_string())]);
    }

    #[test]
    fn thinking_span_is_reported_separately_from_text() {
        let mut p = parser();
        let mut events = p.feed("before <thinking>pondering</thinking> after");
        events.extend(p.finish());
        assert_eq!(
            events,
            vec![
                ParseEvent::Text("before ".to_string()),
                ParseEvent::Thinking("pondering".to_string()),
                ParseEvent::Text(" after".to_string()),
            ]
        );
    }

    // ── Tool call decoding ───────────────────────────────────────────────

    #[test]
    fn decodes_a_complete_tool_call() {
        let mut p = parser();
        let xml = r#"<tool>{"server_name":"local","tool_name":"calculator","arguments":{"expression":"1+1"}}</tool>"#;
        let events = p.feed(xml);
        assert_eq!(
            events,
            vec![ParseEvent::ToolCall(ToolCallEnvelope {
                server_name: "local".to_string(),
                tool_name: "calculator".to_string(),
                arguments: json!({"expression": "1+1"}),
            })]
        );
    }

    #[test]
    fn rejects_non_local_server_name() {
        let mut p = parser();
        let xml = r#"<tool>{"server_name":"remote","tool_name":"calculator","arguments":{}}</tool>"#;
        let events = p.feed(xml);
        assert_eq!(
            events,
            vec![ParseEvent::UnsupportedServer {
                server_name: "remote".to_string()
            }]
        );
    }

    #[test]
    fn missing_tool_name_is_invalid() {
        let mut p = parser();
        let xml = r#"<tool>{"server_name":"local","arguments":{}}</tool>"#;
        let events = p.feed(xml);
        assert!(matches!(events[0], ParseEvent::InvalidToolJson { .. }));
    }

    #[test]
    fn malformed_json_is_repaired_when_possible() {
        let mut p = parser();
        let xml = r#"<tool>{"server_name":"local","tool_name":"x","arguments":{"path":"C:\oops"}}</tool>"#;
        let events = p.feed(xml);
        assert!(matches!(events[0], ParseEvent::ToolCall(_)));
    }

    #[test]
    fn unrepairable_json_reports_invalid_tool_json() {
        let mut p = parser();
        let xml = "<tool>not json at all {{{</tool>";
        let events = p.feed(xml);
        assert!(matches!(events[0], ParseEvent::InvalidToolJson { .. }));
    }

    // ── Chunk-boundary equivalence (the hard invariant) ─────────────────

    #[test]
    fn closing_tag_split_across_chunks_is_still_detected() {
        let xml = r#"<tool>{"server_name":"local","tool_name":"calculator","arguments":{}}</tool>"#;
        for split in 1..xml.len() {
            let (a, b) = xml.split_at(split);
            let mut p = parser();
            let mut events = p.feed(a);
            events.extend(p.feed(b));
            events.extend(p.finish());
            assert_eq!(
                events,
                vec![ParseEvent::ToolCall(ToolCallEnvelope {
                    server_name: "local".to_string(),
                    tool_name: "calculator".to_string(),
                    arguments: json!({}),
                })],
                "split at byte {split} produced different events"
            );
        }
    }

    #[test]
    fn thinking_close_tag_split_one_byte_at_a_time() {
        let input = "<thinking>abc</thinking>done";
        let mut p = parser();
        let mut events = Vec::new();
        for byte in input.as_bytes() {
            events.extend(p.feed(std::str::from_utf8(&[*byte]).unwrap()));
        }
        events.extend(p.finish());
        // Thinking content may arrive as several small chunks; what matters
        // is that concatenating them reproduces the span exactly and the
        // tag itself is never leaked.
        let thinking: String = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Thinking(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Text(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(thinking, "abc");
        assert_eq!(text, "done");
    }

    #[test]
    fn no_event_ever_contains_a_tag_fragment() {
        let xml = "plain <thinking>think</thinking> more <tool>{\"server_name\":\"local\",\"tool_name\":\"t\",\"arguments\":{}}</tool> end";
        for split in 1..xml.len() {
            let (a, b) = xml.split_at(split);
            let mut p = parser();
            let mut events = p.feed(a);
            events.extend(p.feed(b));
            events.extend(p.finish());
            for e in &events {
                if let ParseEvent::Text(t) | ParseEvent::Thinking(t) = e {
                    assert!(!t.contains('<'), "leaked a tag fragment: {t:?}");
                }
            }
        }
    }

    // ── Oversized tool payload ───────────────────────────────────────────

    #[test]
    fn oversized_tool_payload_is_reported_and_resets_state() {
        let mut p = StreamingParser::new(16);
        let mut events = p.feed("<tool>");
        events.extend(p.feed(&"x".repeat(64)));
        assert!(matches!(events.last(), Some(ParseEvent::Oversized { limit: 16 })));
        // parser recovers to Plain afterward
        events.extend(p.feed("</tool> trailing text"));
        events.extend(p.finish());
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Text(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert!(text.contains("trailing text"));
    }

    // ── finish() ─────────────────────────────────────────────────────────

    #[test]
    fn finish_flushes_trailing_plain_text() {
        let mut p = parser();
        let _ = p.feed("no closing needed");
        let tail = p.finish();
        assert_eq!(tail, vec![ParseEvent::Text("no closing needed".to_string())]);
    }

    #[test]
    fn finish_on_unterminated_tool_span_reports_invalid_json() {
        let mut p = parser();
        let _ = p.feed(r#"<tool>{"server_name":"local""#);
        let tail = p.finish();
        assert!(matches!(tail[0], ParseEvent::InvalidToolJson { .. }));
    }
}
