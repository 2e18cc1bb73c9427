//! Abstract Syntax Tree for Rainlang documents
//!
//! A document is a list of sources (`;` separated), each a list of
//! statements (`,` separated) binding LHS names to RHS nodes. Unresolved
//! parts are `None`; a document containing any of them never compiles.

use crate::problem::{Position, Problem};
use num_bigint::BigUint;

/// A name attached to a node by the binder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Bound name (may be `_`)
    pub name: String,
    /// Position of the name on the LHS
    pub position: Position,
}

/// A numeric literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueNode {
    /// Text as written
    pub raw: String,
    /// Parsed value; `None` if out of range
    pub value: Option<BigUint>,
    /// Location
    pub position: Position,
    /// LHS name bound to the value
    pub tag: Option<Tag>,
}

/// One `<...>` operand argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandArg {
    /// Argument value
    pub value: u32,
    /// Location
    pub position: Position,
}

/// An opcode call `name<args>(parameters)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeNode {
    /// Name as written
    pub name: String,
    /// Opcode index; `None` for unknown opcodes
    pub opcode: Option<u16>,
    /// From the first character of the name to the closing paren
    pub position: Position,
    /// From `(` to `)`
    pub paren: Option<Position>,
    /// Packed operand; `None` until successfully resolved
    pub operand: Option<u16>,
    /// Output count; `None` until successfully resolved
    pub outputs: Option<usize>,
    /// Arguments written inside `<...>`
    pub operand_args: Vec<OperandArg>,
    /// Stack parameters
    pub parameters: Vec<Node>,
    /// LHS names bound to the outputs, in order
    pub tags: Vec<Tag>,
}

impl OpcodeNode {
    /// Whether this node and all its parameters are resolved
    pub fn is_resolved(&self) -> bool {
        self.opcode.is_some()
            && self.operand.is_some()
            && self.outputs.is_some()
            && self.parameters.iter().all(Node::is_resolved)
    }
}

/// A reference to a name bound by an earlier statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasNode {
    /// Referenced name
    pub name: String,
    /// Location
    pub position: Position,
    /// LHS name bound to the reference
    pub tag: Option<Tag>,
}

/// An RHS node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Numeric literal
    Value(ValueNode),
    /// Opcode call
    Opcode(OpcodeNode),
    /// Name reference
    Alias(AliasNode),
}

impl Node {
    /// Location of the node
    pub fn position(&self) -> Position {
        match self {
            Node::Value(node) => node.position,
            Node::Opcode(node) => node.position,
            Node::Alias(node) => node.position,
        }
    }

    /// Number of stack values the node leaves; `None` if unresolved
    pub fn output_count(&self) -> Option<usize> {
        match self {
            Node::Value(_) | Node::Alias(_) => Some(1),
            Node::Opcode(node) => node.outputs,
        }
    }

    /// Whether the node (recursively) can be compiled
    pub fn is_resolved(&self) -> bool {
        match self {
            Node::Value(node) => node.value.is_some(),
            Node::Opcode(node) => node.is_resolved(),
            Node::Alias(_) => true,
        }
    }

    /// Attach a bound name
    pub fn attach(&mut self, tag: Tag) {
        match self {
            Node::Value(node) => node.tag = Some(tag),
            Node::Opcode(node) => node.tags.push(tag),
            Node::Alias(node) => node.tag = Some(tag),
        }
    }

    /// Bound names of the node
    pub fn tags(&self) -> Vec<&Tag> {
        match self {
            Node::Value(node) => node.tag.iter().collect(),
            Node::Opcode(node) => node.tags.iter().collect(),
            Node::Alias(node) => node.tag.iter().collect(),
        }
    }

    /// First unresolved node in pre-order
    pub fn find_unresolved(&self) -> Option<&Node> {
        match self {
            Node::Value(node) if node.value.is_none() => Some(self),
            Node::Value(_) | Node::Alias(_) => None,
            Node::Opcode(node) => {
                if node.opcode.is_none() || node.operand.is_none() || node.outputs.is_none() {
                    return Some(self);
                }
                node.parameters.iter().find_map(Node::find_unresolved)
            }
        }
    }
}

/// One name on a statement's LHS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LhsName {
    /// Name as written (`_` discards)
    pub name: String,
    /// Location
    pub position: Position,
}

impl LhsName {
    /// Whether the name can be referenced later
    pub fn is_bindable(&self) -> bool {
        self.name != "_" && rainlang_bytecode::is_word(&self.name)
    }
}

/// `lhs: rhs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Location of the whole statement
    pub position: Position,
    /// Names being bound
    pub lhs: Vec<LhsName>,
    /// Top-level nodes
    pub rhs: Vec<Node>,
}

/// One `;` terminated source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Location
    pub position: Position,
    /// Statements in order
    pub statements: Vec<Statement>,
}

impl Source {
    /// All LHS names in order; the index of a name is its stack slot
    pub fn lhs_names(&self) -> impl Iterator<Item = &LhsName> {
        self.statements.iter().flat_map(|statement| statement.lhs.iter())
    }
}

/// A `/* ... */` comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment text including delimiters
    pub text: String,
    /// Location
    pub position: Position,
}

/// Result of parsing one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Original text
    pub text: String,
    /// Sources in order
    pub sources: Vec<Source>,
    /// Comments in order
    pub comments: Vec<Comment>,
    /// Problems in discovery order
    pub problems: Vec<Problem>,
}

impl Document {
    /// Whether the document parsed without problems
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    /// First unresolved node anywhere in the document
    pub fn find_unresolved(&self) -> Option<&Node> {
        self.sources
            .iter()
            .flat_map(|source| source.statements.iter())
            .flat_map(|statement| statement.rhs.iter())
            .find_map(Node::find_unresolved)
    }
}
