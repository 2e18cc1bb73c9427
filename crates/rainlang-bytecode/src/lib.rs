//! Rainlang Bytecode Definitions
//!
//! This crate provides the opcode metadata model, the operand bit codec,
//! numeric literal handling and the 4-byte instruction word encoding used by
//! the Rainlang parser, compiler and decompiler.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bits;
pub mod encoder;
pub mod expression;
pub mod formula;
pub mod literal;
pub mod meta;

pub use bits::{extract_bits, pack_bits, BitRange, PackItem, ValidRange};
pub use encoder::{
    decode_memory_operand, memory_operand, BytecodeReader, BytecodeWriter, DecodeError,
    MemoryKind, Word, MAX_MEMORY_INDEX, WORD_SIZE,
};
pub use expression::{ExpressionConfig, ExpressionError};
pub use formula::{invert, Formula, FormulaError};
pub use literal::{
    is_numeric_word, is_sentinel, parse_literal, to_decimal, LiteralError, MAX_UINT256,
};
pub use meta::{
    is_word, normalize_word, DeployerRecord, InputRule, MemoryStore, MetaError, MetaStore,
    OpMeta, OpMetaTable, OperandArgMeta, OperandRule, OutputRule, Parameter, StoreError,
    INPUTS_ARG,
};
