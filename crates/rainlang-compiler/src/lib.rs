//! Rainlang Compiler - AST to Bytecode and back
//!
//! This crate lowers parsed Rainlang documents into an [`ExpressionConfig`]
//! (one bytecode array per source plus a shared constant pool), renders
//! bytecode back into Rainlang text and re-indents text for reading.
//!
//! # Example
//!
//! ```
//! use rainlang_compiler::Rainlang;
//!
//! let rainlang = Rainlang::builtin();
//! let config = rainlang.compile("_: add(1 2);").unwrap();
//! assert_eq!(config.constants, vec!["1", "2"]);
//! assert_eq!(rainlang.decompile(&config).unwrap(), "_: add(\n  1\n  2\n);");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codegen;
pub mod config;
pub mod constants;
pub mod decompile;
pub mod error;
pub mod pretty;

pub use codegen::{Compiler, DEFAULT_MEMORY_OPCODE};
pub use config::{ConfigError, FormatConfig, RainlangConfig};
pub use constants::ConstantPool;
pub use decompile::{Decompiler, StackSlot};
pub use error::{CompileError, CompileResult, DecompileError, DecompileResult};
pub use pretty::pretty;

// Re-export the artifact and diagnostics types for convenience
pub use rainlang_bytecode::{ExpressionConfig, OpMetaTable};
pub use rainlang_parser::{Document, ErrorCode, Position, Problem};

/// Opcode table plus configuration: the whole text-to-bytecode pipeline
#[derive(Debug, Clone)]
pub struct Rainlang {
    table: OpMetaTable,
    config: RainlangConfig,
}

impl Rainlang {
    /// Create a pipeline over a table
    pub fn new(table: OpMetaTable, config: RainlangConfig) -> Self {
        Self { table, config }
    }

    /// Pipeline over the builtin opcode table with default settings
    pub fn builtin() -> Self {
        Self::new(OpMetaTable::builtin().clone(), RainlangConfig::default())
    }

    /// Opcode table in use
    pub fn table(&self) -> &OpMetaTable {
        &self.table
    }

    /// Settings in use
    pub fn config(&self) -> &RainlangConfig {
        &self.config
    }

    /// Parse text, collecting problems
    pub fn parse(&self, text: &str) -> Document {
        rainlang_parser::parse(text, &self.table)
    }

    /// Parse and compile text
    pub fn compile(&self, text: &str) -> CompileResult<ExpressionConfig> {
        let document = self.parse(text);
        Compiler::new(&self.table)
            .with_memory_opcode(self.config.memory_opcode.as_str())
            .compile(&document)
    }

    /// Render bytecode as text, re-indented if configured
    pub fn decompile(&self, expression: &ExpressionConfig) -> DecompileResult<String> {
        let text = Decompiler::new(&self.table)
            .with_memory_opcode(self.config.memory_opcode.as_str())
            .decompile(expression)?;
        if self.config.format.pretty {
            Ok(pretty(&text, self.config.format.indent))
        } else {
            Ok(text)
        }
    }

    /// Re-indent text with the configured indent.
    ///
    /// Always formats; `format.pretty` only applies to [`Rainlang::decompile`].
    pub fn format(&self, text: &str) -> String {
        pretty(text, self.config.format.indent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_respects_config() {
        let config = RainlangConfig {
            format: FormatConfig {
                pretty: false,
                indent: 2,
            },
            ..RainlangConfig::default()
        };
        let rainlang = Rainlang::new(OpMetaTable::builtin().clone(), config);
        let expression = rainlang.compile("_: add(1 2);").unwrap();
        assert_eq!(rainlang.decompile(&expression).unwrap(), "_: add(1 2);");
        assert_eq!(rainlang.format("_: add(1 2);"), "_: add(\n  1\n  2\n);");
    }

    #[test]
    fn test_format() {
        let rainlang = Rainlang::builtin();
        assert_eq!(rainlang.format("_: is-zero(0);"), "_: is-zero(\n  0\n);");
    }

    #[test]
    fn test_custom_memory_opcode_name() {
        let config = RainlangConfig {
            memory_opcode: "nope".into(),
            ..RainlangConfig::default()
        };
        let rainlang = Rainlang::new(OpMetaTable::builtin().clone(), config);
        assert!(matches!(
            rainlang.compile("_: 1;"),
            Err(CompileError::MissingMemoryOpcode { .. })
        ));
    }
}
