//! Compiled expression artifact

use crate::encoder::WORD_SIZE;
use crate::literal::{parse_literal, LiteralError};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading an [`ExpressionConfig`]
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// JSON (de)serialization failure
    #[error("Invalid expression config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A source is not a whole number of words
    #[error("Source {source_index} has length {len}, not a multiple of 4")]
    Misaligned {
        /// Index of the offending source
        source_index: usize,
        /// Its byte length
        len: usize,
    },

    /// A constant is not a valid numeric literal
    #[error("Constant {index} is invalid: {error}")]
    InvalidConstant {
        /// Index into the constant pool
        index: usize,
        /// Why it was rejected
        error: LiteralError,
    },

    /// A constant index past the end of the pool
    #[error("Constant index {0} is out of range")]
    ConstantOutOfRange(usize),
}

/// Bytecode sources plus their shared constant pool.
///
/// Constants are distinct values in first-seen order, stored as decimal
/// strings; hex strings are also accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionConfig {
    /// One bytecode buffer per source
    #[serde(with = "hex_sources")]
    pub sources: Vec<Vec<u8>>,
    /// Constant pool
    pub constants: Vec<String>,
}

impl ExpressionConfig {
    /// Create a config
    pub fn new(sources: Vec<Vec<u8>>, constants: Vec<String>) -> Self {
        Self { sources, constants }
    }

    /// Read constant `index` as a number
    pub fn constant(&self, index: usize) -> Result<BigUint, ExpressionError> {
        let raw = self
            .constants
            .get(index)
            .ok_or(ExpressionError::ConstantOutOfRange(index))?;
        parse_literal(raw.trim()).map_err(|error| ExpressionError::InvalidConstant { index, error })
    }

    /// Check that every source is word aligned and every constant parses
    pub fn validate(&self) -> Result<(), ExpressionError> {
        for (source_index, source) in self.sources.iter().enumerate() {
            if source.len() % WORD_SIZE != 0 {
                return Err(ExpressionError::Misaligned {
                    source_index,
                    len: source.len(),
                });
            }
        }
        for index in 0..self.constants.len() {
            self.constant(index)?;
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, ExpressionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ExpressionError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

mod hex_sources {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sources: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(sources.iter().map(|s| format!("0x{}", hex::encode(s))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(D::Error::custom))
            .collect()
    }
}
