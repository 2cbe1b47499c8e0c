// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;

use thiserror::Error;

use crate::schema::AgentConfig;

#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl AgentConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// any key the file omits.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, AgentConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| AgentConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&raw, path)
    }

    fn load_from_str(raw: &str, path: &Path) -> Result<Self, AgentConfigError> {
        toml::from_str(raw).map_err(|source| AgentConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads from `path` if it exists, otherwise returns defaults.  Used by
    /// the harness binary so a missing config file is not an error.
    pub fn load_from_file_or_default(path: impl AsRef<Path>) -> Result<Self, AgentConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_file_parses_overrides_and_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
            max_iterations = 25
            auto_approved_tools = ["calculator"]

            [context]
            fresh_window = 5
            "#
        )
        .unwrap();

        let cfg = AgentConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg.max_iterations, 25);
        assert_eq!(cfg.auto_approved_tools, vec!["calculator".to_string()]);
        assert_eq!(cfg.context.fresh_window, 5);
        assert_eq!(cfg.context.buffer_min, 10); // default
    }

    #[test]
    fn load_from_file_or_default_tolerates_missing_file() {
        let cfg = AgentConfig::load_from_file_or_default("/nonexistent/path/agent.toml").unwrap();
        assert_eq!(cfg.max_iterations, 10);
    }

    #[test]
    fn load_from_file_reports_parse_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "max_iterations = \"not a number\"").unwrap();
        let err = AgentConfig::load_from_file(f.path()).unwrap_err();
        assert!(matches!(err, AgentConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_file_reports_io_error_for_unreadable_path() {
        let err = AgentConfig::load_from_file("/nonexistent/definitely/missing.toml").unwrap_err();
        assert!(matches!(err, AgentConfigError::Io { .. }));
    }
}
