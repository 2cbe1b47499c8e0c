// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Deterministic, content-aware tool-result truncation (supplementary
//! feature: output-category-aware truncation).
//!
//! Grounded on the teacher's `compact::smart_truncate`, with the
//! `FileContent` category dropped — this workspace has no file-reading
//! tool, so `HeadTail` and `MatchList` cover every built-in.
use agent_tools::OutputCategory;

/// Returns `content` unchanged when it fits within `cap_tokens` (chars/4
/// estimate). Otherwise applies a category-specific extraction strategy that
/// preserves the most useful portion of the output and appends a notice so
/// the model knows more content exists.
///
/// - [`OutputCategory::HeadTail`]: keep the first 60 + last 40 lines so both
///   the command preamble and the final result are visible.
/// - [`OutputCategory::MatchList`]: keep leading matches; the tail is not
///   preserved because later matches are less relevant.
/// - [`OutputCategory::Generic`]: hard-truncate at the nearest line boundary.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::HeadTail => head_tail_lines(
            content,
            cap_chars,
            60,
            40,
            &format!("[... {{lines}} lines / {omitted_bytes} bytes omitted ...]"),
        ),
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[... {{lines}} more matches omitted ({omitted_bytes} bytes); \
                 use a more specific pattern to see them ...]"
            ),
        ),
        OutputCategory::Generic => {
            let cut = content[..cap_chars]
                .rfind('\n')
                .map(|p| p + 1)
                .unwrap_or(cap_chars);
            format!(
                "{}\n[... {omitted_bytes} bytes omitted; \
                 content truncated to fit context budget ...]",
                &content[..cut]
            )
        }
    }
}

/// Keep only the leading lines that fit within `cap_chars`.
fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

/// Keep `max_head` leading lines and `max_tail` trailing lines, inserting a
/// notice between them.
fn head_tail_lines(
    content: &str,
    cap_chars: usize,
    max_head: usize,
    max_tail: usize,
    notice_template: &str,
) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let half_cap = cap_chars / 2;

    let mut head = String::with_capacity(half_cap);
    let mut head_count = 0usize;
    for line in lines.iter().take(max_head) {
        let needed = if head.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if head.len() + needed > half_cap {
            break;
        }
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str(line);
        head_count += 1;
    }

    let mut tail_lines: Vec<&str> = Vec::new();
    let mut tail_chars = 0usize;
    for line in lines.iter().rev().take(max_tail) {
        let needed = if tail_lines.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if tail_chars + needed > half_cap {
            break;
        }
        tail_chars += needed;
        tail_lines.push(line);
    }
    tail_lines.reverse();
    let tail_count = tail_lines.len();
    let tail = tail_lines.join("\n");

    let omitted = lines.len().saturating_sub(head_count + tail_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{head}\n{notice}\n{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_original_when_under_cap() {
        let short = "hello world";
        assert_eq!(smart_truncate(short, OutputCategory::HeadTail, 100), short);
    }

    #[test]
    fn zero_cap_returns_original() {
        let content = "x".repeat(1000);
        assert_eq!(
            smart_truncate(&content, OutputCategory::HeadTail, 0),
            content
        );
    }

    #[test]
    fn empty_content_returns_empty() {
        assert_eq!(smart_truncate("", OutputCategory::Generic, 10), "");
    }

    #[test]
    fn head_tail_preserves_first_and_last_lines() {
        let content = (0..200)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(result.starts_with("line 0"), "must preserve first line");
        assert!(result.contains("line 199"), "must preserve last line");
        assert!(result.contains("omitted"));
    }

    #[test]
    fn head_tail_drops_middle_lines_beyond_budget() {
        let content = (0..200)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(!result.contains("line 100"));
    }

    #[test]
    fn match_list_keeps_leading_matches_only() {
        let content = (0..100)
            .map(|i| format!("match {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::MatchList, 50);
        assert!(result.starts_with("match 0"));
        assert!(!result.contains("match 99"), "MatchList must not jump to tail");
        assert!(result.contains("matches omitted"));
    }

    #[test]
    fn generic_hard_truncates_at_line_boundary() {
        let content = (0..50)
            .map(|i| format!("row {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::Generic, 10);
        assert!(result.contains("bytes omitted"));
        assert!(result.len() < content.len() + 80);
    }
}
