use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DialogueError, Result};
use crate::graph::{SchemaVersion, MIN_SCHEMA_VERSION};

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// How the engine treats speech nodes that have a single way forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    /// Advance through them immediately.
    #[default]
    Auto,
    /// Rest on them until the host calls `advance`.
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub step_mode: StepMode,
    /// Upper bound on edges traversed by a single step before the session is ended.
    #[serde(default = "default_max_auto_steps")]
    pub max_auto_steps: usize,
    /// Oldest asset schema version sessions may be started on.
    #[serde(default = "default_min_schema_version")]
    pub min_schema_version: String,
    /// Fixed random seed for every session (None = fresh seed per session).
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_mode: StepMode::default(),
            max_auto_steps: default_max_auto_steps(),
            min_schema_version: default_min_schema_version(),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }

    pub fn with_max_auto_steps(mut self, limit: usize) -> Self {
        self.max_auto_steps = limit;
        self
    }

    pub fn with_min_schema_version(mut self, version: impl Into<String>) -> Self {
        self.min_schema_version = version.into();
        self
    }

    /// Parsed `min_schema_version`.
    pub fn min_version(&self) -> Result<SchemaVersion> {
        SchemaVersion::parse(&self.min_schema_version).ok_or_else(|| {
            DialogueError::Config(format!(
                "invalid min_schema_version '{}'",
                self.min_schema_version
            ))
        })
    }
}

fn default_max_auto_steps() -> usize { 1000 }
fn default_min_schema_version() -> String { MIN_SCHEMA_VERSION.to_string() }

/// Logging configuration for hosts that install a tracing subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Include the event target (module path) in log lines.
    #[serde(default)]
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            with_target: false,
        }
    }
}

fn default_log_filter() -> String { "parley=info,warn".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| DialogueError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| DialogueError::Config(e.to_string()))?;
        config.engine.min_version()?;
        if config.engine.max_auto_steps == 0 {
            return Err(DialogueError::Config(
                "max_auto_steps must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Unset variables stay as written
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
