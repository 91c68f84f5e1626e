//! Server configuration.
//!
//! Limits and defaults for the workspace, loadable from TOML.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tabula_common::{
    DEFAULT_MAX_ROWS, DEFAULT_MAX_SCRIPT_ROWS, DEFAULT_MAX_SCRIPT_STATEMENTS,
    DEFAULT_PREVIEW_ROWS, DEFAULT_SAMPLE_SEED,
};
use tabula_script::ScriptLimits;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Rows shown by `head` and by materialization when no count is given.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Upper bound for `top_n` and `full_string` output.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Seed for `sample_string`.
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,

    /// Maximum statements per script.
    #[serde(default = "default_max_script_statements")]
    pub max_script_statements: usize,

    /// Maximum rows in any table a script produces.
    #[serde(default = "default_max_script_rows")]
    pub max_script_rows: usize,

    /// Scripts running longer than this are logged as slow.
    #[serde(default = "default_slow_execution_threshold")]
    pub slow_execution_threshold_ms: u64,

    /// Log every request at info level.
    #[serde(default)]
    pub log_requests: bool,
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

fn default_sample_seed() -> u64 {
    DEFAULT_SAMPLE_SEED
}

fn default_max_script_statements() -> usize {
    DEFAULT_MAX_SCRIPT_STATEMENTS
}

fn default_max_script_rows() -> usize {
    DEFAULT_MAX_SCRIPT_ROWS
}

fn default_slow_execution_threshold() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
            max_rows: default_max_rows(),
            sample_seed: default_sample_seed(),
            max_script_statements: default_max_script_statements(),
            max_script_rows: default_max_script_rows(),
            slow_execution_threshold_ms: default_slow_execution_threshold(),
            log_requests: false,
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the interpreter limits.
    pub fn script_limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_statements: self.max_script_statements,
            max_rows: self.max_script_rows,
        }
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preview row count.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.config.preview_rows = rows;
        self
    }

    /// Sets the row cap.
    pub fn max_rows(mut self, rows: usize) -> Self {
        self.config.max_rows = rows;
        self
    }

    /// Sets the sampling seed.
    pub fn sample_seed(mut self, seed: u64) -> Self {
        self.config.sample_seed = seed;
        self
    }

    /// Sets the per-script statement limit.
    pub fn max_script_statements(mut self, max: usize) -> Self {
        self.config.max_script_statements = max;
        self
    }

    /// Sets the per-table row limit for scripts.
    pub fn max_script_rows(mut self, max: usize) -> Self {
        self.config.max_script_rows = max;
        self
    }

    /// Sets the slow execution threshold.
    pub fn slow_execution_threshold_ms(mut self, ms: u64) -> Self {
        self.config.slow_execution_threshold_ms = ms;
        self
    }

    /// Enables request logging.
    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.config.log_requests = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.preview_rows, 5);
        assert_eq!(config.max_rows, 1000);
        assert_eq!(config.sample_seed, 42);
        assert_eq!(config.max_script_statements, 256);
        assert!(!config.log_requests);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .max_rows(10)
            .sample_seed(7)
            .max_script_rows(500)
            .log_requests(true)
            .build();

        assert_eq!(config.max_rows, 10);
        assert_eq!(config.sample_seed, 7);
        assert!(config.log_requests);
        assert_eq!(config.script_limits().max_rows, 500);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("max_rows = 20\n").unwrap();
        assert_eq!(config.max_rows, 20);
        assert_eq!(config.preview_rows, 5);
        assert_eq!(config.slow_execution_threshold_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("tabula.toml");

        let config = ServerConfig::builder().preview_rows(3).sample_seed(99).build();
        config.save(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(config.to_toml().unwrap().contains("sample_seed = 99"));
    }
}
