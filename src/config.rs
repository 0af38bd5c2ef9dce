//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::query::DEFAULT_MAX_DEPTH;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Deepest nested array a filter may drill into
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Reject unknown query keys instead of ignoring them
    #[serde(default)]
    pub strict: bool,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            strict: false,
        }
    }
}

/// Result rendering format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Table,
}

impl OutputFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "table" => Some(Self::Table),
            _ => None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pretty: default_pretty(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("nestquery").join("config.toml")),
            Some(PathBuf::from("/etc/nestquery/config.toml")),
            Some(PathBuf::from("./nestquery.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Engine overrides
        if let Some(depth) = var("NESTQUERY_MAX_DEPTH") {
            match depth.parse() {
                Ok(d) => self.engine.max_depth = d,
                Err(_) => tracing::warn!("Ignoring invalid NESTQUERY_MAX_DEPTH: {}", depth),
            }
        }
        if let Some(strict) = var("NESTQUERY_STRICT") {
            self.engine.strict = matches!(strict.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        // Output overrides
        if let Some(format) = var("NESTQUERY_OUTPUT_FORMAT") {
            match OutputFormat::from_str(&format) {
                Some(f) => self.output.format = f,
                None => tracing::warn!("Ignoring unknown NESTQUERY_OUTPUT_FORMAT: {}", format),
            }
        }

        // Logging overrides
        if let Some(level) = var("NESTQUERY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("NESTQUERY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Nestquery Configuration
#
# Environment variables override these settings:
# - NESTQUERY_MAX_DEPTH
# - NESTQUERY_STRICT
# - NESTQUERY_OUTPUT_FORMAT
# - NESTQUERY_LOG_LEVEL
# - NESTQUERY_LOG_FORMAT

[engine]
# Deepest nested array a filter may drill into
max_depth = 64

# Reject unknown query keys instead of ignoring them
strict = false

[output]
# Result format: json, csv or table
format = "json"

# Pretty-print JSON output
pretty = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.max_depth, 64);
        assert!(!config.engine.strict);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.engine.max_depth, 64);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nstrict = true\n\n[output]\nformat = \"table\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.engine.strict);
        assert_eq!(config.engine.max_depth, 64);
        assert_eq!(config.output.format, OutputFormat::Table);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[engine]\nmax_depth = \"deep\"").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NESTQUERY_MAX_DEPTH", "8"),
            ("NESTQUERY_STRICT", "true"),
            ("NESTQUERY_OUTPUT_FORMAT", "CSV"),
            ("NESTQUERY_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.engine.max_depth, 8);
        assert!(config.engine.strict);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_invalid_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "NESTQUERY_MAX_DEPTH").then(|| "lots".to_string()));
        assert_eq!(config.engine.max_depth, 64);
    }
}
