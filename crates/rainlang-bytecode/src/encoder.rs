//! Bytecode encoding and decoding utilities
//!
//! A source is a flat sequence of 4-byte words. Each word holds a 16-bit
//! opcode index followed by a 16-bit operand, both big-endian.

use std::fmt;
use thiserror::Error;

/// Size of one instruction word in bytes
pub const WORD_SIZE: usize = 4;

/// Largest index addressable by a memory read (15 bits)
pub const MAX_MEMORY_INDEX: usize = 0x7FFF;

/// Errors that can occur during bytecode decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Source length is not a whole number of words
    #[error("Bytecode length {0} is not a multiple of 4")]
    Misaligned(usize),
}

/// One decoded instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Word {
    /// Opcode index into the opcode metadata table
    pub opcode: u16,
    /// Operand bits
    pub operand: u16,
}

impl Word {
    /// Create a word
    pub fn new(opcode: u16, operand: u16) -> Self {
        Self { opcode, operand }
    }

    /// Big-endian byte form
    pub fn to_bytes(self) -> [u8; WORD_SIZE] {
        let [op_hi, op_lo] = self.opcode.to_be_bytes();
        let [arg_hi, arg_lo] = self.operand.to_be_bytes();
        [op_hi, op_lo, arg_hi, arg_lo]
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} {:#06x}", self.opcode, self.operand)
    }
}

/// Where a memory read takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// A value already on the stack, by slot index
    Stack = 0,
    /// A value from the constant pool, by index
    Constant = 1,
}

/// Build the operand of a memory read: `index << 1 | kind`.
///
/// Returns `None` when the index does not fit in 15 bits.
pub fn memory_operand(kind: MemoryKind, index: usize) -> Option<u16> {
    if index > MAX_MEMORY_INDEX {
        return None;
    }
    Some(((index as u16) << 1) | kind as u16)
}

/// Split a memory read operand into its kind and index
pub fn decode_memory_operand(operand: u16) -> (MemoryKind, usize) {
    let kind = if operand & 1 == 1 {
        MemoryKind::Constant
    } else {
        MemoryKind::Stack
    };
    (kind, usize::from(operand >> 1))
}

/// Bytecode writer for encoding instruction words
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create a new bytecode writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new bytecode writer with room for `words` instructions
    pub fn with_capacity(words: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(words * WORD_SIZE),
        }
    }

    /// Get the current bytecode buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytecode buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Number of words emitted so far
    pub fn word_count(&self) -> usize {
        self.buffer.len() / WORD_SIZE
    }

    // ===== Emission =====

    /// Emit a 16-bit unsigned integer (big-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit one instruction word
    pub fn emit_word(&mut self, opcode: u16, operand: u16) {
        self.emit_u16(opcode);
        self.emit_u16(operand);
    }

    /// Emit a memory read instruction
    pub fn emit_memory_read(&mut self, memory_opcode: u16, kind: MemoryKind, index: usize) -> Option<()> {
        let operand = memory_operand(kind, index)?;
        self.emit_word(memory_opcode, operand);
        Some(())
    }
}

/// Bytecode reader for decoding instruction words
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a new bytecode reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Create a reader, rejecting buffers that are not whole words
    pub fn aligned(buffer: &'a [u8]) -> Result<Self, DecodeError> {
        if buffer.len() % WORD_SIZE != 0 {
            return Err(DecodeError::Misaligned(buffer.len()));
        }
        Ok(Self::new(buffer))
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Read a 16-bit unsigned integer (big-endian)
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        if self.position + 2 > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = [self.buffer[self.position], self.buffer[self.position + 1]];
        self.position += 2;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read one instruction word
    pub fn read_word(&mut self) -> Result<Word, DecodeError> {
        if self.position + WORD_SIZE > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let opcode = self.read_u16()?;
        let operand = self.read_u16()?;
        Ok(Word { opcode, operand })
    }
}

impl Iterator for BytecodeReader<'_> {
    type Item = Result<Word, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_more() {
            Some(self.read_word())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_is_big_endian() {
        let mut writer = BytecodeWriter::new();
        writer.emit_word(0x0102, 0x0304);
        assert_eq!(writer.buffer(), &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(Word::new(0x0102, 0x0304).to_bytes(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_reader_reads_words() {
        let mut writer = BytecodeWriter::with_capacity(2);
        writer.emit_word(0, 3);
        writer.emit_word(7, 0xFFFF);
        assert_eq!(writer.word_count(), 2);

        let bytes = writer.into_bytes();
        let words: Result<Vec<_>, _> = BytecodeReader::aligned(&bytes).unwrap().collect();
        assert_eq!(words.unwrap(), vec![Word::new(0, 3), Word::new(7, 0xFFFF)]);
    }

    #[test]
    fn test_reader_bounds_checking() {
        let bytes = vec![0x00, 0x01, 0x00];
        assert_eq!(
            BytecodeReader::aligned(&bytes).err(),
            Some(DecodeError::Misaligned(3))
        );
        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_word(), Err(DecodeError::UnexpectedEnd(0)));
    }

    #[test]
    fn test_memory_operand_layout() {
        assert_eq!(memory_operand(MemoryKind::Constant, 0), Some(1));
        assert_eq!(memory_operand(MemoryKind::Stack, 3), Some(6));
        assert_eq!(memory_operand(MemoryKind::Constant, MAX_MEMORY_INDEX + 1), None);
        assert_eq!(decode_memory_operand(7), (MemoryKind::Constant, 3));
        assert_eq!(decode_memory_operand(4), (MemoryKind::Stack, 2));
    }
}
