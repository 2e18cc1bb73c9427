//! Lowering of parsed documents into bytecode
//!
//! Every source becomes one byte array of 4-byte words. Parameters are
//! emitted before the opcode consuming them, values and aliases become
//! memory reads of the constant pool or of earlier stack slots.

use crate::constants::ConstantPool;
use crate::error::{CompileError, CompileResult};
use rainlang_bytecode::{
    decode_memory_operand, BytecodeWriter, ExpressionConfig, MemoryKind, OpMetaTable,
};
use rainlang_parser::{Document, Node, Position, Source};
use rustc_hash::FxHashMap;

/// Default name of the opcode reading constants and stack slots
pub const DEFAULT_MEMORY_OPCODE: &str = "read-memory";

/// Compiles documents parsed against one opcode table
#[derive(Debug, Clone)]
pub struct Compiler<'a> {
    table: &'a OpMetaTable,
    memory_opcode: String,
}

impl<'a> Compiler<'a> {
    /// Create a compiler using [`DEFAULT_MEMORY_OPCODE`]
    pub fn new(table: &'a OpMetaTable) -> Self {
        Self {
            table,
            memory_opcode: DEFAULT_MEMORY_OPCODE.to_string(),
        }
    }

    /// Use another opcode for memory reads
    pub fn with_memory_opcode(mut self, name: impl Into<String>) -> Self {
        self.memory_opcode = name.into();
        self
    }

    /// Compile a document.
    ///
    /// Nothing is emitted unless the whole document is free of problems and
    /// unresolved nodes.
    pub fn compile(&self, document: &Document) -> CompileResult<ExpressionConfig> {
        if !document.problems.is_empty() {
            return Err(CompileError::Diagnostics(document.problems.clone()));
        }
        if let Some(node) = document.find_unresolved() {
            return Err(CompileError::Unresolved {
                position: node.position(),
            });
        }
        let (memory, _) = self.table.lookup(&self.memory_opcode).ok_or_else(|| {
            CompileError::MissingMemoryOpcode {
                name: self.memory_opcode.clone(),
            }
        })?;

        let mut pool = ConstantPool::new();
        let sources = document
            .sources
            .iter()
            .map(|source| SourceLowering::new(memory, &mut pool).lower(source))
            .collect::<CompileResult<Vec<_>>>()?;

        tracing::debug!(
            sources = sources.len(),
            constants = pool.len(),
            words = sources.iter().map(|s| s.len() / 4).sum::<usize>(),
            "compiled rainlang document"
        );

        Ok(ExpressionConfig::new(sources, pool.into_strings()))
    }
}

/// Lowering state of one source
struct SourceLowering<'p> {
    memory: u16,
    pool: &'p mut ConstantPool,
    writer: BytecodeWriter,
    /// Names bound by completed statements
    slots: FxHashMap<String, usize>,
    /// Stack slots produced by completed statements
    slot_count: usize,
}

impl<'p> SourceLowering<'p> {
    fn new(memory: u16, pool: &'p mut ConstantPool) -> Self {
        Self {
            memory,
            pool,
            writer: BytecodeWriter::new(),
            slots: FxHashMap::default(),
            slot_count: 0,
        }
    }

    fn lower(mut self, source: &Source) -> CompileResult<Vec<u8>> {
        for statement in &source.statements {
            for node in &statement.rhs {
                self.lower_node(node)?;
            }
            // Names become visible only to later statements
            for (i, name) in statement.lhs.iter().enumerate() {
                if name.is_bindable() {
                    self.slots
                        .entry(name.name.clone())
                        .or_insert(self.slot_count + i);
                }
            }
            self.slot_count += statement.lhs.len();
        }
        Ok(self.writer.into_bytes())
    }

    fn lower_node(&mut self, node: &Node) -> CompileResult<()> {
        match node {
            Node::Value(value) => {
                let Some(number) = &value.value else {
                    return Err(CompileError::Unresolved {
                        position: value.position,
                    });
                };
                let index = self.pool.add(number)?;
                self.writer
                    .emit_memory_read(self.memory, MemoryKind::Constant, index)
                    .ok_or(CompileError::TooManyConstants)
            }
            Node::Alias(alias) => {
                let slot = *self.slots.get(&alias.name).ok_or_else(|| {
                    CompileError::UnresolvedAlias {
                        name: alias.name.clone(),
                        position: alias.position,
                    }
                })?;
                self.writer
                    .emit_memory_read(self.memory, MemoryKind::Stack, slot)
                    .ok_or(CompileError::StackSlotOutOfRange { slot })
            }
            Node::Opcode(call) => {
                for parameter in &call.parameters {
                    self.lower_node(parameter)?;
                }
                match (call.opcode, call.operand) {
                    (Some(opcode), Some(operand)) => {
                        if opcode == self.memory {
                            self.check_memory_read(operand, call.position)?;
                        }
                        self.writer.emit_word(opcode, operand);
                        Ok(())
                    }
                    _ => Err(CompileError::Unresolved {
                        position: call.position,
                    }),
                }
            }
        }
    }

    /// An explicit memory read may only see constants already in the pool
    /// and slots of completed statements.
    fn check_memory_read(&self, operand: u16, position: Position) -> CompileResult<()> {
        let (kind, index) = decode_memory_operand(operand);
        let available = match kind {
            MemoryKind::Constant => self.pool.len(),
            MemoryKind::Stack => self.slot_count,
        };
        if index < available {
            Ok(())
        } else {
            Err(CompileError::InvalidMemoryRead {
                kind,
                index,
                position,
            })
        }
    }
}
