//! Parser configuration.

use std::collections::BTreeSet;

use buildscope_events::{BuildscopeError, Result};
use serde::{Deserialize, Serialize};

/// Option names whose values carry `NAME=value` environment captures.
pub const DEFAULT_ENV_OPTION_NAMES: &[&str] = &[
    "client_env",
    "action_env",
    "test_env",
    "repo_env",
    "host_action_env",
];

/// Tunables for [`crate::StreamingEventParser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Command-line options treated as environment captures and masked
    /// unless allow-listed via `ALLOW_ENV`.
    pub env_option_names: BTreeSet<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            env_option_names: DEFAULT_ENV_OPTION_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ParserConfig {
    pub fn is_env_option(&self, option_name: &str) -> bool {
        self.env_option_names.contains(option_name)
    }

    /// Reject configurations that would let environment values through unmasked.
    pub fn validate(&self) -> Result<()> {
        if self.env_option_names.is_empty() {
            return Err(BuildscopeError::Config(
                "env_option_names must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .env_option_names
            .iter()
            .find(|name| name.trim().is_empty() || name.starts_with('-'))
        {
            return Err(BuildscopeError::Config(format!(
                "invalid env option name {bad:?}: use the bare option name, e.g. \"client_env\""
            )));
        }
        Ok(())
    }
}
