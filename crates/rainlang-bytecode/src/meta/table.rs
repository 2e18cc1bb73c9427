//! Opcode metadata table
//!
//! The position of an entry in the table is its opcode index in bytecode.

use super::model::{normalize_word, OpMeta};
use super::store::MetaStore;
use super::MetaError;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use rustc_hash::FxHashMap;
use std::io::Read;
use std::sync::LazyLock;

static BUILTIN_JSON: &str = include_str!("../../meta/opmeta.json");

static BUILTIN: LazyLock<OpMetaTable> = LazyLock::new(|| {
    OpMetaTable::from_json_str(BUILTIN_JSON).expect("builtin opcode metadata is valid")
});

/// Ordered, validated opcode metadata with a name index
#[derive(Debug, Clone)]
pub struct OpMetaTable {
    ops: Vec<OpMeta>,
    index: FxHashMap<String, u16>,
}

impl OpMetaTable {
    /// Build a table, validating every entry and name uniqueness
    pub fn new(ops: Vec<OpMeta>) -> Result<Self, MetaError> {
        if ops.is_empty() {
            return Err(MetaError::Empty);
        }
        if ops.len() > usize::from(u16::MAX) + 1 {
            return Err(MetaError::TooManyOpcodes(ops.len()));
        }

        let mut index = FxHashMap::default();
        for (opcode, op) in ops.iter().enumerate() {
            op.validate()?;
            for name in std::iter::once(&op.name).chain(op.aliases.iter()) {
                let key = normalize_word(name);
                // Bounded by the length check above.
                if index.insert(key.clone(), opcode as u16).is_some() {
                    return Err(MetaError::DuplicateName(key));
                }
            }
        }

        tracing::debug!(opcodes = ops.len(), names = index.len(), "loaded opcode metadata");
        Ok(Self { ops, index })
    }

    /// Table shipped with the crate
    pub fn builtin() -> &'static OpMetaTable {
        &BUILTIN
    }

    /// Load from JSON text (an array of opcode entries)
    pub fn from_json_str(json: &str) -> Result<Self, MetaError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Load from an already parsed JSON value
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, MetaError> {
        Self::new(serde_json::from_value(value)?)
    }

    /// Load from bytes holding plain JSON or zlib/raw deflate compressed JSON
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetaError> {
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        if matches!(first, Some(b'[') | Some(b'{')) {
            return Self::new(serde_json::from_slice(bytes)?);
        }
        let json = inflate(bytes)?;
        Self::new(serde_json::from_slice(&json)?)
    }

    /// Load from a hex string (with or without `0x`) of [`OpMetaTable::from_bytes`] input
    pub fn from_hex(hex_str: &str) -> Result<Self, MetaError> {
        let trimmed = hex_str.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))?;
        Self::from_bytes(&bytes)
    }

    /// Load the metadata recorded under `hash` in a store
    pub fn from_store(store: &dyn MetaStore, hash: &str) -> Result<Self, MetaError> {
        let bytes = store.resolve_op_meta(hash)?;
        tracing::debug!(hash, bytes = bytes.len(), "resolved op meta from store");
        Self::from_bytes(&bytes)
    }

    /// Load the metadata a deployer was authored with
    pub fn from_deployer(store: &dyn MetaStore, deployer_hash: &str) -> Result<Self, MetaError> {
        let deployer = store.resolve_deployer(deployer_hash)?;
        Self::from_store(store, &deployer.authoring_meta_hash)
    }

    /// Number of opcodes
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the table is empty (never true for a constructed table)
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Entry for an opcode index
    pub fn get(&self, opcode: u16) -> Option<&OpMeta> {
        self.ops.get(usize::from(opcode))
    }

    /// Find an opcode by name or alias (case-insensitive, `_` ≡ `-`)
    pub fn lookup(&self, name: &str) -> Option<(u16, &OpMeta)> {
        let opcode = *self.index.get(&normalize_word(name))?;
        Some((opcode, &self.ops[usize::from(opcode)]))
    }

    /// Iterate entries in opcode order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &OpMeta)> {
        self.ops.iter().enumerate().map(|(i, op)| (i as u16, op))
    }

    /// Serialize back to JSON
    pub fn to_json(&self) -> Result<String, MetaError> {
        Ok(serde_json::to_string_pretty(&self.ops)?)
    }
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, MetaError> {
    let mut out = Vec::new();
    if ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    DeflateDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(MetaError::Decompress)?;
    Ok(out)
}
