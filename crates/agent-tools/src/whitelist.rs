// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use agent_config::CommandWhitelistEntry;

/// Matches shell commands against a set of prefix patterns. A pattern
/// matches a command when the command equals the pattern exactly, or starts
/// with the pattern followed by a space — `"git status"` matches `"git
/// status"` and `"git status --short"` but not `"git status2"`.
pub struct CommandWhitelist {
    patterns: Vec<String>,
}

impl CommandWhitelist {
    pub fn new(entries: &[CommandWhitelistEntry]) -> Self {
        Self {
            patterns: entries.iter().map(|e| e.pattern.clone()).collect(),
        }
    }

    pub fn is_whitelisted(&self, command: &str) -> bool {
        self.patterns.iter().any(|p| matches_prefix(p, command))
    }
}

fn matches_prefix(pattern: &str, command: &str) -> bool {
    command == pattern || command.starts_with(&format!("{pattern} "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str) -> CommandWhitelistEntry {
        CommandWhitelistEntry {
            pattern: pattern.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn exact_match_is_whitelisted() {
        let w = CommandWhitelist::new(&[entry("git status")]);
        assert!(w.is_whitelisted("git status"));
    }

    #[test]
    fn prefix_with_space_boundary_is_whitelisted() {
        let w = CommandWhitelist::new(&[entry("git status")]);
        assert!(w.is_whitelisted("git status --short"));
    }

    #[test]
    fn prefix_without_space_boundary_is_rejected() {
        let w = CommandWhitelist::new(&[entry("git status")]);
        assert!(!w.is_whitelisted("git status2"));
    }

    #[test]
    fn unrelated_command_is_rejected() {
        let w = CommandWhitelist::new(&[entry("git status")]);
        assert!(!w.is_whitelisted("rm -rf /"));
    }

    #[test]
    fn empty_whitelist_rejects_everything() {
        let w = CommandWhitelist::new(&[]);
        assert!(!w.is_whitelisted("ls"));
    }

    #[test]
    fn multiple_patterns_any_match_wins() {
        let w = CommandWhitelist::new(&[entry("ls"), entry("cat")]);
        assert!(w.is_whitelisted("cat README.md"));
        assert!(w.is_whitelisted("ls"));
        assert!(!w.is_whitelisted("rm file"));
    }
}
