//! Constant pool for compiled expressions

use crate::error::{CompileError, CompileResult};
use num_bigint::BigUint;
use rainlang_bytecode::{to_decimal, MAX_MEMORY_INDEX};
use rustc_hash::FxHashMap;

/// Document-wide pool of literal values, deduplicated by value
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    values: Vec<BigUint>,
    index: FxHashMap<BigUint, usize>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return its index, reusing the index of an equal value
    pub fn add(&mut self, value: &BigUint) -> CompileResult<usize> {
        if let Some(&index) = self.index.get(value) {
            return Ok(index);
        }
        let index = self.values.len();
        if index > MAX_MEMORY_INDEX {
            return Err(CompileError::TooManyConstants);
        }
        self.values.push(value.clone());
        self.index.insert(value.clone(), index);
        Ok(index)
    }

    /// Get a value by index
    pub fn get(&self, index: usize) -> Option<&BigUint> {
        self.values.get(index)
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values as canonical decimal strings, in insertion order
    pub fn into_strings(self) -> Vec<String> {
        self.values.iter().map(to_decimal).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_value() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add(&BigUint::from(7u32)).unwrap(), 0);
        assert_eq!(pool.add(&BigUint::from(9u32)).unwrap(), 1);
        assert_eq!(pool.add(&BigUint::from(7u32)).unwrap(), 0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(1), Some(&BigUint::from(9u32)));
        assert_eq!(pool.into_strings(), vec!["7", "9"]);
    }

    #[test]
    fn test_pool_limit() {
        let mut pool = ConstantPool::new();
        for i in 0..=MAX_MEMORY_INDEX {
            pool.add(&BigUint::from(i)).unwrap();
        }
        assert_eq!(
            pool.add(&BigUint::from(MAX_MEMORY_INDEX + 1)),
            Err(CompileError::TooManyConstants)
        );
        // Existing values are still found
        assert_eq!(pool.add(&BigUint::from(3u32)).unwrap(), 3);
    }
}
