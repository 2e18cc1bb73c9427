//! Compilation and decompilation errors

use rainlang_bytecode::MemoryKind;
use rainlang_parser::{Position, Problem};
use thiserror::Error;

/// Result of compiling a document
pub type CompileResult<T> = Result<T, CompileError>;

/// Result of decompiling an expression
pub type DecompileResult<T> = Result<T, DecompileError>;

/// Reasons a document cannot be lowered to bytecode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The document has parse problems
    #[error("Document has {} problem(s)", .0.len())]
    Diagnostics(Vec<Problem>),

    /// A node never resolved to an opcode, operand or value
    #[error("Unresolved node at {position}")]
    Unresolved {
        /// Location of the first unresolved node
        position: Position,
    },

    /// An alias refers to a name with no stack slot
    #[error("Alias '{name}' at {position} is not bound to a stack slot")]
    UnresolvedAlias {
        /// Referenced name
        name: String,
        /// Location of the reference
        position: Position,
    },

    /// The opcode table cannot read memory
    #[error("Opcode table has no memory read opcode '{name}'")]
    MissingMemoryOpcode {
        /// Configured opcode name
        name: String,
    },

    /// Constant pool is full
    #[error("Too many constants (max 32768)")]
    TooManyConstants,

    /// An explicit memory read of an entry that does not exist yet
    #[error("Memory read at {position} of {kind:?} index {index}, which does not exist yet")]
    InvalidMemoryRead {
        /// Memory region read
        kind: MemoryKind,
        /// Index within the region
        index: usize,
        /// Location of the read
        position: Position,
    },

    /// Stack slot cannot be encoded in a memory read
    #[error("Stack slot {slot} is out of range (max 32767)")]
    StackSlotOutOfRange {
        /// Slot index
        slot: usize,
    },
}

/// Reasons bytecode cannot be turned back into text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompileError {
    /// A source is not a whole number of words
    #[error("Source {source_index} has length {len}, not a multiple of 4")]
    Misaligned {
        /// Source index
        source_index: usize,
        /// Length in bytes
        len: usize,
    },

    /// Opcode index has no metadata
    #[error("Unknown opcode {opcode} at byte {offset} of source {source_index}")]
    UnknownOpcode {
        /// Source index
        source_index: usize,
        /// Byte offset of the word
        offset: usize,
        /// Opcode index
        opcode: u16,
    },

    /// Operand does not unpack into arguments
    #[error("Corrupt operand {operand:#06x} for {name}")]
    CorruptOperand {
        /// Opcode name
        name: String,
        /// Raw operand
        operand: u16,
    },

    /// Not enough values on the simulated stack
    #[error("{name} needs {needed} input(s) but only {available} value(s) are available")]
    StackUnderflow {
        /// Opcode name
        name: String,
        /// Inputs required
        needed: usize,
        /// Values available
        available: usize,
    },

    /// Memory read of a constant that does not exist
    #[error("Constant index {0} is out of range")]
    ConstantOutOfRange(usize),

    /// Memory read of a stack slot that is not readable
    #[error("Invalid read of stack slot {index}")]
    InvalidStackRead {
        /// Slot index
        index: usize,
    },

    /// A constant is not a valid value
    #[error("Constant {index} is invalid: {message}")]
    InvalidConstant {
        /// Constant index
        index: usize,
        /// What is wrong with it
        message: String,
    },
}
