//! Engine configuration structures.
//!
//! All structures deserialize from TOML with per-field defaults, so a
//! partial file only overrides what it names:
//!
//! ```toml
//! default_max_rows = 500
//!
//! [table]
//! segment_count = 4
//! duplicate_policy = "overwrite"
//!
//! [compile]
//! timeout_ms = 2000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML text could not be parsed into a configuration.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration parsed but failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What `Put` does with a second row at an existing `(key, timestamp)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep both rows; rows with equal timestamps stay in insertion order.
    #[default]
    KeepVersions,
    /// Replace the earlier row.
    Overwrite,
}

/// Table store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Number of independently locked key-index segments.
    /// Default: 8
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,

    /// Initial key capacity of each segment.
    /// Default: 1024
    #[serde(default = "default_bucket_count")]
    pub bucket_count: usize,

    /// Largest accepted row buffer in bytes.
    /// Default: 1048576 (1 MB)
    #[serde(default = "default_max_row_size")]
    pub max_row_size: usize,

    /// Handling of duplicate `(key, timestamp)` writes.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

fn default_segment_count() -> usize {
    8
}

fn default_bucket_count() -> usize {
    1024
}

fn default_max_row_size() -> usize {
    1024 * 1024
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            segment_count: default_segment_count(),
            bucket_count: default_bucket_count(),
            max_row_size: default_max_row_size(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl TableConfig {
    /// Sets the segment count.
    #[must_use]
    pub fn with_segments(mut self, segment_count: usize) -> Self {
        self.segment_count = segment_count;
        self
    }

    /// Sets the per-segment bucket count.
    #[must_use]
    pub fn with_buckets(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// Sets the duplicate policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Sets the maximum row size.
    #[must_use]
    pub fn with_max_row_size(mut self, max_row_size: usize) -> Self {
        self.max_row_size = max_row_size;
        self
    }
}

/// Code generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Compile time limit in milliseconds. Zero disables the limit.
    /// Default: 5000
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Backend name used for logging and backend selection.
    /// Default: "closure"
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_backend() -> String {
    "closure".to_string()
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            backend: default_backend(),
        }
    }
}

impl CompileConfig {
    /// Returns the compile time limit, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Top-level engine configuration.
///
/// # Example
///
/// ```rust
/// use windlass_common::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.table.segment_count, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Row cap used when a caller does not supply one.
    #[serde(default = "default_max_rows")]
    pub default_max_rows: usize,

    /// Table store configuration.
    #[serde(default)]
    pub table: TableConfig,

    /// Code generation configuration.
    #[serde(default)]
    pub compile: CompileConfig,
}

fn default_max_rows() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_rows: default_max_rows(),
            table: TableConfig::default(),
            compile: CompileConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a minimal configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            default_max_rows: 100,
            table: TableConfig {
                segment_count: 1,
                bucket_count: 16,
                ..Default::default()
            },
            compile: CompileConfig::default(),
        }
    }

    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.table.segment_count == 0 {
            return Err("table.segment_count must be at least 1".to_string());
        }

        if self.table.max_row_size < 6 {
            return Err("table.max_row_size must cover the 6-byte row header".to_string());
        }

        if self.table.max_row_size > u32::MAX as usize {
            return Err("table.max_row_size must fit in a u32".to_string());
        }

        if self.compile.backend.is_empty() {
            return Err("compile.backend must not be empty".to_string());
        }

        Ok(())
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for engine configuration.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the table configuration.
    #[must_use]
    pub fn table(mut self, table: TableConfig) -> Self {
        self.config.table = table;
        self
    }

    /// Sets the compile timeout in milliseconds.
    #[must_use]
    pub fn compile_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.compile.timeout_ms = timeout_ms;
        self
    }

    /// Sets the default row cap.
    #[must_use]
    pub fn default_max_rows(mut self, max_rows: usize) -> Self {
        self.config.default_max_rows = max_rows;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
