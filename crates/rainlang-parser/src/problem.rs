//! Parse problems and their error codes

use rainlang_bytecode::MetaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive `[start, end]` character offsets into the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct Position {
    /// First character
    pub start: usize,
    /// Last character (inclusive)
    pub end: usize,
}

impl Position {
    /// Create a position
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Position of a single character
    pub fn at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    /// Half-open character range
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end + 1
    }
}

impl From<[usize; 2]> for Position {
    fn from(value: [usize; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<Position> for [usize; 2] {
    fn from(position: Position) -> Self {
        [position.start, position.end]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Band an [`ErrorCode`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Runtime failures and illegal characters (0-12)
    Runtime,
    /// References to things that do not exist (257-263)
    Undefined,
    /// Malformed constructs (513-532)
    InvalidSyntax,
    /// Tokens that should not appear where they do (769-776)
    UnexpectedToken,
    /// Tokens that are missing (1025-1041)
    ExpectedToken,
    /// Count mismatches (1281-1283)
    Mismatch,
    /// Values outside their accepted range (1537-1539)
    OutOfRange,
    /// Duplicate definitions (1793-1796)
    Duplicate,
}

macro_rules! error_codes {
    ($($(#[$doc:meta])* $name:ident = $value:literal,)*) => {
        /// Numeric problem code, grouped in bands (see [`ErrorCategory`])
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum ErrorCode {
            $($(#[$doc])* $name = $value,)*
        }

        impl ErrorCode {
            /// Code for a raw value, if it is one
            pub fn from_u16(value: u16) -> Option<Self> {
                match value {
                    $($value => Some(ErrorCode::$name),)*
                    _ => None,
                }
            }

            /// Name of the code
            pub fn name(self) -> &'static str {
                match self {
                    $(ErrorCode::$name => stringify!($name),)*
                }
            }
        }
    };
}

error_codes! {
    /// Unclassified failure
    UndefinedError = 0,
    /// Internal failure while processing the document
    RuntimeError = 1,
    /// Character that is not part of the language
    IllegalChar = 2,
    /// Opcode metadata could not be loaded
    InvalidOpMeta = 3,

    /// Word that is neither a name, a number nor an opcode
    UndefinedWord = 257,
    /// Call of an unknown opcode
    UndefinedOpcode = 258,

    /// Word does not follow the naming pattern
    InvalidWordPattern = 513,
    /// Statement without exactly one `:`
    InvalidStatement = 514,
    /// Name used in its own definition
    InvalidSelfReference = 515,
    /// Opcode without exactly one output nested in another opcode
    InvalidNestedNode = 516,

    /// Token that cannot appear here
    UnexpectedToken = 769,
    /// `)` without a matching `(`
    UnexpectedClosingParen = 770,
    /// `>` without a matching `<`
    UnexpectedClosingAngleParen = 771,
    /// Comment without `*/`
    UnexpectedEndOfComment = 772,
    /// `<...>` not directly after an opcode
    UnexpectedOperandArgs = 773,
    /// `,` inside a parameter list
    UnexpectedComma = 774,

    /// `(` without an opcode before it
    ExpectedOpcode = 1025,
    /// `(` never closed
    ExpectedClosingParen = 1026,
    /// Opcode without `(`
    ExpectedOpeningParen = 1027,
    /// `<` never closed
    ExpectedClosingAngleBracket = 1028,
    /// Opcode requires `<...>` arguments
    ExpectedOperandArgs = 1029,

    /// More names than values
    MismatchRHS = 1281,
    /// More values than names
    MismatchLHS = 1282,
    /// Wrong number of operand arguments
    MismatchOperandArgs = 1283,

    /// Parameter count not accepted by the opcode
    OutOfRangeInputs = 1537,
    /// Operand argument does not fit its bits or range
    OutOfRangeOperandArgs = 1538,
    /// Numeric value above max-uint256
    OutOfRangeValue = 1539,

    /// Name bound twice in one source
    DuplicateAlias = 1793,
}

impl ErrorCode {
    /// Band of the code
    pub fn category(self) -> ErrorCategory {
        match self as u16 {
            0..=12 => ErrorCategory::Runtime,
            257..=263 => ErrorCategory::Undefined,
            513..=532 => ErrorCategory::InvalidSyntax,
            769..=776 => ErrorCategory::UnexpectedToken,
            1025..=1041 => ErrorCategory::ExpectedToken,
            1281..=1283 => ErrorCategory::Mismatch,
            1537..=1539 => ErrorCategory::OutOfRange,
            _ => ErrorCategory::Duplicate,
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        ErrorCode::from_u16(value).ok_or_else(|| format!("unknown error code {}", value))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A recoverable diagnostic attached to a range of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// What went wrong
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Where it went wrong
    pub position: Position,
}

impl Problem {
    /// Create a problem
    pub fn new(code: ErrorCode, message: impl Into<String>, position: Position) -> Self {
        Self {
            code,
            message: message.into(),
            position,
        }
    }

    /// Create an "undefined word" problem.
    pub fn undefined_word(word: &str, position: Position) -> Self {
        Self::new(ErrorCode::UndefinedWord, format!("undefined word: {}", word), position)
    }

    /// Create an "invalid word pattern" problem.
    pub fn invalid_word(word: &str, position: Position) -> Self {
        Self::new(
            ErrorCode::InvalidWordPattern,
            format!("invalid word pattern: {}", word),
            position,
        )
    }

    /// Create a single problem spanning the whole document for unusable metadata
    pub fn invalid_op_meta(error: &MetaError, text: &str) -> Self {
        let len = text.chars().count();
        Self::new(
            ErrorCode::InvalidOpMeta,
            error.to_string(),
            Position::new(0, len.saturating_sub(1)),
        )
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) at {}: {}",
            self.code, self.code as u16, self.position, self.message
        )
    }
}

impl std::error::Error for Problem {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_bands() {
        assert_eq!(ErrorCode::IllegalChar.category(), ErrorCategory::Runtime);
        assert_eq!(ErrorCode::UndefinedWord as u16, 257);
        assert_eq!(ErrorCode::UndefinedWord.category(), ErrorCategory::Undefined);
        assert_eq!(ErrorCode::InvalidNestedNode.category(), ErrorCategory::InvalidSyntax);
        assert_eq!(ErrorCode::UnexpectedClosingParen.category(), ErrorCategory::UnexpectedToken);
        assert_eq!(ErrorCode::ExpectedOpcode as u16, 1025);
        assert_eq!(ErrorCode::MismatchRHS as u16, 1281);
        assert_eq!(ErrorCode::OutOfRangeValue as u16, 1539);
        assert_eq!(ErrorCode::DuplicateAlias.category(), ErrorCategory::Duplicate);
    }

    #[test]
    fn test_code_roundtrip() {
        assert_eq!(ErrorCode::from_u16(1538), Some(ErrorCode::OutOfRangeOperandArgs));
        assert_eq!(ErrorCode::from_u16(42), None);
        assert_eq!(ErrorCode::MismatchLHS.name(), "MismatchLHS");
    }

    #[test]
    fn test_problem_json() {
        let problem = Problem::undefined_word("foo", Position::new(3, 5));
        let json = serde_json::to_string(&problem).unwrap();
        assert_eq!(
            json,
            r#"{"code":257,"message":"undefined word: foo","position":[3,5]}"#
        );
        assert_eq!(serde_json::from_str::<Problem>(&json).unwrap(), problem);
    }

    #[test]
    fn test_invalid_op_meta_spans_document() {
        let error = rainlang_bytecode::OpMetaTable::from_json_str("[]").unwrap_err();

        let problem = Problem::invalid_op_meta(&error, "_: add(1 é);");
        assert_eq!(problem.code, ErrorCode::InvalidOpMeta);
        assert_eq!(problem.code as u16, 3);
        assert_eq!(problem.position, Position::new(0, 11));
        assert!(problem.message.starts_with("invalid op meta"));

        let empty = Problem::invalid_op_meta(&error, "");
        assert_eq!(empty.position, Position::new(0, 0));
    }

    #[test]
    fn test_position_range() {
        assert_eq!(Position::new(3, 5).range(), 3..6);
        assert_eq!(Position::at(0).range(), 0..1);
    }
}
