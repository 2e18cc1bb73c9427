//! Compiler configuration (`rainlang.toml`)
//!
//! ```toml
//! memory_opcode = "read-memory"
//!
//! [format]
//! pretty = true
//! indent = 2
//! ```

use crate::codegen::DEFAULT_MEMORY_OPCODE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is not usable
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by the compiler and decompiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainlangConfig {
    /// Opcode used to read constants and stack slots
    pub memory_opcode: String,

    /// Decompiler output formatting
    pub format: FormatConfig,
}

/// Decompiler output formatting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Re-indent decompiled text
    pub pretty: bool,

    /// Spaces per nesting level
    pub indent: usize,
}

impl Default for RainlangConfig {
    fn default() -> Self {
        Self {
            memory_opcode: DEFAULT_MEMORY_OPCODE.to_string(),
            format: FormatConfig::default(),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: 2,
        }
    }
}

impl RainlangConfig {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RainlangConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_opcode.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "memory_opcode must not be empty".to_string(),
            ));
        }
        if self.format.indent > 16 {
            return Err(ConfigError::Invalid(format!(
                "format.indent must be at most 16, found {}",
                self.format.indent
            )));
        }
        Ok(())
    }
}
