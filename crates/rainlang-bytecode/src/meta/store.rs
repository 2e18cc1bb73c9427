//! Metadata store boundary
//!
//! Metadata is content addressed. The compiler only ever needs two lookups:
//! opcode metadata bytes by hash and a deployer record by hash. Fetching,
//! caching and hash validation belong to the store implementation.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a [`MetaStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No opcode metadata recorded under the hash
    #[error("no op meta found for hash {0}")]
    OpMetaNotFound(String),

    /// No deployer recorded under the hash
    #[error("no deployer found for hash {0}")]
    DeployerNotFound(String),

    /// The backing store failed
    #[error("meta store failure: {0}")]
    Backend(String),
}

/// Deployer contracts an expression is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployerRecord {
    /// Parser contract address
    pub parser: String,
    /// Store contract address
    pub store: String,
    /// Interpreter contract address
    pub interpreter: String,
    /// Deployed bytecode
    #[serde(with = "hex_bytes")]
    pub bytecode: Vec<u8>,
    /// Hash of the opcode metadata the deployer was built with
    pub authoring_meta_hash: String,
}

/// Source of content-addressed metadata
pub trait MetaStore {
    /// Raw (possibly compressed) opcode metadata for a hash
    fn resolve_op_meta(&self, hash: &str) -> Result<Vec<u8>, StoreError>;

    /// Deployer record for a hash
    fn resolve_deployer(&self, hash: &str) -> Result<DeployerRecord, StoreError>;
}

/// In-memory [`MetaStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    op_meta: FxHashMap<String, Vec<u8>>,
    deployers: FxHashMap<String, DeployerRecord>,
}

fn key(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record opcode metadata under a hash
    pub fn insert_op_meta(&mut self, hash: &str, bytes: Vec<u8>) {
        self.op_meta.insert(key(hash), bytes);
    }

    /// Record a deployer under a hash
    pub fn insert_deployer(&mut self, hash: &str, record: DeployerRecord) {
        self.deployers.insert(key(hash), record);
    }
}

impl MetaStore for MemoryStore {
    fn resolve_op_meta(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        self.op_meta
            .get(&key(hash))
            .cloned()
            .ok_or_else(|| StoreError::OpMetaNotFound(hash.to_string()))
    }

    fn resolve_deployer(&self, hash: &str) -> Result<DeployerRecord, StoreError> {
        self.deployers
            .get(&key(hash))
            .cloned()
            .ok_or_else(|| StoreError::DeployerNotFound(hash.to_string()))
    }
}

mod hex_bytes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lookup_is_case_insensitive() {
        let mut store = MemoryStore::new();
        store.insert_op_meta("0xABCD", vec![1, 2, 3]);
        assert_eq!(store.resolve_op_meta("0xabcd"), Ok(vec![1, 2, 3]));
        assert_eq!(
            store.resolve_op_meta("0x01"),
            Err(StoreError::OpMetaNotFound("0x01".to_string()))
        );
    }

    #[test]
    fn test_deployer_record_json() {
        let record = DeployerRecord {
            parser: "0x01".into(),
            store: "0x02".into(),
            interpreter: "0x03".into(),
            bytecode: vec![0xde, 0xad],
            authoring_meta_hash: "0xfeed".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"bytecode\":\"0xdead\""));
        assert!(json.contains("authoringMetaHash"));
        assert_eq!(serde_json::from_str::<DeployerRecord>(&json).unwrap(), record);

        let mut store = MemoryStore::new();
        store.insert_deployer("0xD1", record.clone());
        assert_eq!(store.resolve_deployer("0xd1"), Ok(record));
    }
}
