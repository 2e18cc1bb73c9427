//! Opcode metadata: model, table loading and the metadata store boundary

mod model;
mod store;
mod table;

pub use model::{
    is_word, normalize_word, InputRule, OpMeta, OperandArgMeta, OperandRule, OutputRule, Parameter,
    INPUTS_ARG,
};
pub use store::{DeployerRecord, MemoryStore, MetaStore, StoreError};
pub use table::OpMetaTable;

use thiserror::Error;

/// Errors raised while loading opcode metadata. All of them are fatal.
#[derive(Debug, Error)]
pub enum MetaError {
    /// Input is not valid metadata JSON
    #[error("invalid op meta: {0}")]
    Json(#[from] serde_json::Error),

    /// Input is neither JSON nor deflate-compressed JSON
    #[error("invalid op meta: cannot decompress ({0})")]
    Decompress(std::io::Error),

    /// Hex-encoded input is malformed
    #[error("invalid op meta: {0}")]
    Hex(#[from] hex::FromHexError),

    /// An entry breaks a structural rule
    #[error("invalid op meta: opcode '{name}': {reason}")]
    InvalidOpcode {
        /// Offending opcode name
        name: String,
        /// Rule that was broken
        reason: String,
    },

    /// Two entries share a name or alias
    #[error("invalid op meta: duplicate opcode name or alias '{0}'")]
    DuplicateName(String),

    /// No opcodes at all
    #[error("invalid op meta: empty opcode list")]
    Empty,

    /// More opcodes than a 16-bit index can address
    #[error("invalid op meta: {0} opcodes exceed the 16-bit opcode space")]
    TooManyOpcodes(usize),

    /// The metadata store could not provide the metadata
    #[error("op meta unavailable: {0}")]
    Store(#[from] StoreError),
}
