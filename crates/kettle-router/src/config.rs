// File: src/config.rs
// Purpose: Router configuration parsing from kettle.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::context::MatchOptions;

/// Configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub routing: RouterConfig,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    /// Prefix prepended to every registered route (e.g., "/api")
    #[serde(default)]
    pub base_path: Option<String>,

    /// Whether literal segments compare ignoring ASCII case (default: false)
    #[serde(default = "default_false")]
    pub case_insensitive: bool,

    /// Reject requests carrying query keys no selector consumed
    #[serde(default = "default_false")]
    pub strict_query: bool,

    /// Selector evaluations allowed per candidate route
    #[serde(default = "default_max_backtrack_steps")]
    pub max_backtrack_steps: usize,

    /// Deepest selector tree accepted at registration
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

// Default values
fn default_false() -> bool {
    false
}

fn default_max_backtrack_steps() -> usize {
    10_000
}

fn default_max_depth() -> usize {
    64
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            case_insensitive: false,
            strict_query: false,
            max_backtrack_steps: default_max_backtrack_steps(),
            max_depth: default_max_depth(),
        }
    }
}

impl RouterConfig {
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_strict_query(mut self, strict_query: bool) -> Self {
        self.strict_query = strict_query;
        self
    }

    pub fn with_max_backtrack_steps(mut self, steps: usize) -> Self {
        self.max_backtrack_steps = steps;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Per-dispatch matching options derived from this config
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_insensitive: self.case_insensitive,
            max_steps: self.max_backtrack_steps,
        }
    }
}

impl Config {
    /// Load configuration from kettle.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./kettle.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("kettle.toml")
    }
}
