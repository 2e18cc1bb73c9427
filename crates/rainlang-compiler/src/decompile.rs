//! Decompiler: bytecode back to Rainlang text
//!
//! Each source is replayed on a simulated stack of rendered text fragments.
//! The rendered text parses and compiles back to the same words.

use crate::codegen::DEFAULT_MEMORY_OPCODE;
use crate::error::{DecompileError, DecompileResult};
use rainlang_bytecode::{
    decode_memory_operand, to_decimal, BytecodeReader, ExpressionConfig, ExpressionError,
    MemoryKind, OpMeta, OpMetaTable, OperandRule, MAX_UINT256, WORD_SIZE,
};
use rustc_hash::FxHashSet;

/// One entry of the simulated stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackSlot {
    /// Rendered value, the first output of its node
    Value(String),
    /// Extra output of a multi-output opcode
    Placeholder,
    /// Opcode with no outputs; occupies no stack slot
    Effect(String),
}

/// Renders bytecode using one opcode table
#[derive(Debug, Clone)]
pub struct Decompiler<'a> {
    table: &'a OpMetaTable,
    memory_opcode: String,
}

impl<'a> Decompiler<'a> {
    /// Create a decompiler using the default memory read opcode
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

    /// Render every source, one per line
    pub fn decompile(&self, config: &ExpressionConfig) -> DecompileResult<String> {
        let memory = self.table.lookup(&self.memory_opcode).map(|(opcode, _)| opcode);
        let sources = config
            .sources
            .iter()
            .enumerate()
            .map(|(index, bytes)| self.decompile_source(config, memory, index, bytes))
            .collect::<DecompileResult<Vec<_>>>()?;

        tracing::debug!(
            sources = sources.len(),
            constants = config.constants.len(),
            "decompiled rainlang expression"
        );
        Ok(sources.join("\n"))
    }

    fn decompile_source(
        &self,
        config: &ExpressionConfig,
        memory: Option<u16>,
        source_index: usize,
        bytes: &[u8],
    ) -> DecompileResult<String> {
        let misaligned = || DecompileError::Misaligned {
            source_index,
            len: bytes.len(),
        };
        let reader = BytecodeReader::aligned(bytes).map_err(|_| misaligned())?;
        let mut stack = SourceStack::default();

        for (position, word) in reader.enumerate() {
            let word = word.map_err(|_| misaligned())?;
            if Some(word.opcode) == memory {
                stack.read_memory(config, word.operand)?;
                continue;
            }

            let meta = self
                .table
                .get(word.opcode)
                .ok_or(DecompileError::UnknownOpcode {
                    source_index,
                    offset: position * WORD_SIZE,
                    opcode: word.opcode,
                })?;
            tracing::trace!(opcode = %meta.name, operand = word.operand, "decompiling word");
            stack.apply(meta, word.operand)?;
        }

        Ok(stack.render())
    }
}

fn corrupt(meta: &OpMeta, operand: u16) -> DecompileError {
    DecompileError::CorruptOperand {
        name: meta.name.clone(),
        operand,
    }
}

/// Simulated stack of one source
#[derive(Debug, Default)]
struct SourceStack {
    entries: Vec<StackSlot>,
    /// Slots read back by a memory read
    referenced: FxHashSet<usize>,
}

impl SourceStack {
    /// Number of real stack slots (effects excluded)
    fn slot_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry, StackSlot::Effect(_)))
            .count()
    }

    fn read_memory(&mut self, config: &ExpressionConfig, operand: u16) -> DecompileResult<()> {
        let (kind, index) = decode_memory_operand(operand);
        let text = match kind {
            MemoryKind::Constant => {
                let value = config.constant(index).map_err(|err| match err {
                    ExpressionError::ConstantOutOfRange(index) => {
                        DecompileError::ConstantOutOfRange(index)
                    }
                    other => DecompileError::InvalidConstant {
                        index,
                        message: other.to_string(),
                    },
                })?;
                if value == *MAX_UINT256 {
                    "max-uint256".to_string()
                } else {
                    to_decimal(&value)
                }
            }
            MemoryKind::Stack => {
                if index >= self.slot_count() {
                    return Err(DecompileError::InvalidStackRead { index });
                }
                self.referenced.insert(index);
                slot_name(index)
            }
        };
        self.entries.push(StackSlot::Value(text));
        Ok(())
    }

    fn apply(&mut self, meta: &OpMeta, operand: u16) -> DecompileResult<()> {
        let inputs = meta
            .input_count(operand)
            .ok_or_else(|| corrupt(meta, operand))?;
        let outputs = meta
            .output_count(operand)
            .ok_or_else(|| corrupt(meta, operand))?;
        let args = match &meta.operand {
            OperandRule::NoArgs if operand != 0 => return Err(corrupt(meta, operand)),
            OperandRule::NoArgs => Vec::new(),
            OperandRule::ArgList(_) => meta
                .unpack_operand(operand, inputs)
                .ok_or_else(|| corrupt(meta, operand))?,
        };

        let parameters = self.pop_values(&meta.name, inputs)?;
        let mut text = meta.name.clone();
        if !args.is_empty() {
            let args: Vec<String> = args.iter().map(u32::to_string).collect();
            text.push('<');
            text.push_str(&args.join(" "));
            text.push('>');
        }
        text.push('(');
        text.push_str(&parameters.join(" "));
        text.push(')');

        if outputs == 0 {
            self.entries.push(StackSlot::Effect(text));
        } else {
            self.entries.push(StackSlot::Value(text));
            self.entries
                .extend(std::iter::repeat(StackSlot::Placeholder).take(outputs - 1));
        }
        Ok(())
    }

    /// Pop the `count` topmost entries, which must all be values
    fn pop_values(&mut self, name: &str, count: usize) -> DecompileResult<Vec<String>> {
        let available = self
            .entries
            .iter()
            .rev()
            .take_while(|entry| matches!(entry, StackSlot::Value(_)))
            .count();
        if count > available {
            return Err(DecompileError::StackUnderflow {
                name: name.to_string(),
                needed: count,
                available,
            });
        }

        let split = self.entries.len() - count;
        let first_slot = self.slot_count() - count;
        if let Some(index) = (first_slot..first_slot + count).find(|s| self.referenced.contains(s)) {
            // A slot read back later must stay on the stack
            return Err(DecompileError::InvalidStackRead { index });
        }

        Ok(self
            .entries
            .drain(split..)
            .filter_map(|entry| match entry {
                StackSlot::Value(text) => Some(text),
                _ => None,
            })
            .collect())
    }

    /// Render the final stack as statements.
    ///
    /// Slots that are read back get a name and end their statement so that
    /// every read refers to an earlier statement.
    fn render(&self) -> String {
        let mut statements = Vec::new();
        let mut lhs: Vec<String> = Vec::new();
        let mut rhs: Vec<&str> = Vec::new();
        let mut split = false;
        let mut slot = 0;

        for entry in &self.entries {
            if let StackSlot::Value(text) | StackSlot::Effect(text) = entry {
                if split {
                    statements.push(statement(&lhs, &rhs));
                    lhs.clear();
                    rhs.clear();
                    split = false;
                }
                rhs.push(text);
            }
            if matches!(entry, StackSlot::Effect(_)) {
                continue;
            }
            if self.referenced.contains(&slot) {
                lhs.push(slot_name(slot));
                split = true;
            } else {
                lhs.push("_".to_string());
            }
            slot += 1;
        }
        if !lhs.is_empty() || !rhs.is_empty() {
            statements.push(statement(&lhs, &rhs));
        }

        format!("{};", statements.join(", "))
    }
}

fn slot_name(slot: usize) -> String {
    format!("slot-{}", slot)
}

fn statement(lhs: &[String], rhs: &[&str]) -> String {
    format!("{}: {}", lhs.join(" "), rhs.join(" "))
}
