//! Operand formulas
//!
//! Small integer arithmetic expressions over a single variable, used by opcode
//! metadata to transform operand arguments (`arg - 1`) and to derive input or
//! output counts from operand bits (`bits + 1`). Any identifier refers to the
//! bound value.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing or evaluating a formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// Character that cannot appear in a formula
    #[error("Unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    /// Formula ended in the middle of an expression
    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    /// Tokens left over after a complete expression
    #[error("Trailing input at offset {0}")]
    TrailingInput(usize),

    /// Integer literal does not fit in 64 bits
    #[error("Number too large at offset {0}")]
    NumberTooLarge(usize),

    /// Division by zero during evaluation
    #[error("Division by zero")]
    DivisionByZero,

    /// Arithmetic overflow during evaluation
    #[error("Arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Number(i64),
    Var,
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, value: i64) -> Result<i64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Var => Ok(value),
            Expr::Neg(inner) => inner.eval(value)?.checked_neg().ok_or(FormulaError::Overflow),
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval(value)?;
                let r = rhs.eval(value)?;
                match op {
                    BinOp::Add => l.checked_add(r).ok_or(FormulaError::Overflow),
                    BinOp::Sub => l.checked_sub(r).ok_or(FormulaError::Overflow),
                    BinOp::Mul => l.checked_mul(r).ok_or(FormulaError::Overflow),
                    BinOp::Div => {
                        if r == 0 {
                            Err(FormulaError::DivisionByZero)
                        } else {
                            l.checked_div(r).ok_or(FormulaError::Overflow)
                        }
                    }
                }
            }
        }
    }
}

/// A parsed formula, keeping its source text for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse a formula
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let mut parser = FormulaParser {
            chars: source.chars().collect(),
            pos: 0,
        };
        let expr = parser.parse_sum()?;
        parser.skip_whitespace();
        if parser.pos < parser.chars.len() {
            return Err(FormulaError::TrailingInput(parser.pos));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Source text of the formula
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with the variable bound to `value`
    pub fn eval(&self, value: i64) -> Result<i64, FormulaError> {
        self.expr.eval(value)
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Formula::parse(&value)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.source
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Recover the raw value whose image under `formula` is `stored`.
///
/// Searches every raw value in `[0, 2^width)` and returns the first match.
/// Without a formula the stored value is the raw value.
pub fn invert(formula: Option<&Formula>, stored: u32, width: u8) -> Option<u32> {
    let Some(formula) = formula else {
        return Some(stored);
    };
    let target = i64::from(stored);
    (0..(1u32 << width)).find(|raw| formula.eval(i64::from(*raw)).ok() == Some(target))
}

struct FormulaParser {
    chars: Vec<char>,
    pos: usize,
}

impl FormulaParser {
    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    fn parse_sum(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some('+') => BinOp::Add,
                Some('-') => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_product(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some('*') => BinOp::Mul,
                Some('/') => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if self.peek() == Some('-') {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let start = self.pos;
        match self.peek() {
            None => Err(FormulaError::UnexpectedEnd),
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_sum()?;
                match self.peek() {
                    Some(')') => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some(c) => Err(FormulaError::UnexpectedChar(c, self.pos)),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() => {
                let begin = self.pos;
                while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
                let digits: String = self.chars[begin..self.pos].iter().collect();
                digits
                    .parse::<i64>()
                    .map(Expr::Number)
                    .map_err(|_| FormulaError::NumberTooLarge(begin))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                while self.pos < self.chars.len()
                    && (self.chars[self.pos].is_ascii_alphanumeric() || self.chars[self.pos] == '_')
                {
                    self.pos += 1;
                }
                Ok(Expr::Var)
            }
            Some(c) => Err(FormulaError::UnexpectedChar(c, start.max(self.pos))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, value: i64) -> Result<i64, FormulaError> {
        Formula::parse(source)?.eval(value)
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(eval("1 + 2 * 3", 0), Ok(7));
        assert_eq!(eval("(1 + 2) * 3", 0), Ok(9));
        assert_eq!(eval("arg * 2 + 1", 5), Ok(11));
        assert_eq!(eval("bits + 1", 3), Ok(4));
        assert_eq!(eval("-arg + 10", 4), Ok(6));
        assert_eq!(eval("10 - 2 - 3", 0), Ok(5));
    }

    #[test]
    fn test_division() {
        assert_eq!(eval("arg / 2", 7), Ok(3));
        assert_eq!(eval("arg / 0", 7), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Formula::parse("1 +"), Err(FormulaError::UnexpectedEnd));
        assert_eq!(Formula::parse("1 2"), Err(FormulaError::TrailingInput(2)));
        assert!(matches!(
            Formula::parse("arg % 2"),
            Err(FormulaError::TrailingInput(_))
        ));
        assert!(matches!(
            Formula::parse("(arg"),
            Err(FormulaError::UnexpectedEnd)
        ));
    }

    #[test]
    fn test_invert_roundtrip() {
        let formula = Formula::parse("arg - 1").unwrap();
        for raw in 1..16u32 {
            let stored = formula.eval(i64::from(raw)).unwrap() as u32;
            assert_eq!(invert(Some(&formula), stored, 4), Some(raw));
        }
        // 16 is outside the raw domain of a 4-bit field
        assert_eq!(invert(Some(&formula), 15, 4), None);
        assert_eq!(invert(None, 9, 4), Some(9));
    }

    #[test]
    fn test_serde_keeps_source() {
        let formula: Formula = serde_json::from_str("\"arg * 2\"").unwrap();
        assert_eq!(formula.source(), "arg * 2");
        assert_eq!(serde_json::to_string(&formula).unwrap(), "\"arg * 2\"");
    }
}
