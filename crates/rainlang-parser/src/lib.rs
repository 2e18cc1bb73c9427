//! Rainlang Parser
//!
//! Turns Rainlang text into a [`Document`]: sources of statements whose RHS
//! nodes are resolved against an [`OpMetaTable`](rainlang_bytecode::OpMetaTable).
//! Parsing never fails; everything wrong with the text is collected as
//! [`Problem`]s with error codes and character positions.
//!
//! # Example
//!
//! ```
//! use rainlang_bytecode::OpMetaTable;
//!
//! let document = rainlang_parser::parse("x: add(1 2), _: mul(x 3);", OpMetaTable::builtin());
//! assert!(document.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod ast;
mod binder;
pub mod parser;
pub mod problem;
pub mod report;
pub mod segment;

pub use ast::{
    AliasNode, Comment, Document, LhsName, Node, OpcodeNode, OperandArg, Source, Statement, Tag,
    ValueNode,
};
pub use parser::{parse, ParserSession};
pub use problem::{ErrorCategory, ErrorCode, Position, Problem};
pub use report::render_problems;
