//! Opcode metadata model
//!
//! Each opcode describes how its operand is built from `<...>` arguments and
//! how many stack inputs and outputs it has, possibly derived from operand
//! bits.

use super::MetaError;
use crate::bits::{extract_bits, pack_bits, BitRange, PackItem, ValidRange};
use crate::formula::{invert, Formula};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Name of the operand argument that receives the parameter count
pub const INPUTS_ARG: &str = "inputs";

static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap());

/// Canonical form of an opcode name: lowercase with `_` folded to `-`
pub fn normalize_word(word: &str) -> String {
    word.to_ascii_lowercase().replace('_', "-")
}

/// Whether `word` is a valid Rainlang name (`^[a-z][a-z0-9-]*$`)
pub fn is_word(word: &str) -> bool {
    WORD_PATTERN.is_match(word)
}

/// A named, documented stack parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

/// Wire form shared by `inputs` and `outputs`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawArity {
    Count(usize),
    Detailed {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<Parameter>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bits: Option<BitRange>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        computation: Option<Formula>,
    },
}

/// How many stack inputs an opcode takes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawArity", into = "RawArity")]
pub enum InputRule {
    /// Always exactly `n` inputs
    Fixed(usize),
    /// One input per listed parameter
    FromParameterList(Vec<Parameter>),
    /// Derived from operand bits, optionally through a formula
    Computed {
        /// Bits holding the count
        bits: BitRange,
        /// Transformation of the extracted bits
        formula: Option<Formula>,
        /// Documentation of the inputs
        parameters: Vec<Parameter>,
    },
}

impl InputRule {
    /// Input count for a given operand; `None` if the formula cannot be evaluated
    pub fn count(&self, operand: u16) -> Option<usize> {
        match self {
            InputRule::Fixed(n) => Some(*n),
            InputRule::FromParameterList(params) => Some(params.len()),
            InputRule::Computed { bits, formula, .. } => computed_count(operand, *bits, formula.as_ref()),
        }
    }
}

impl TryFrom<RawArity> for InputRule {
    type Error = String;

    fn try_from(raw: RawArity) -> Result<Self, Self::Error> {
        match raw {
            RawArity::Count(n) => Ok(InputRule::Fixed(n)),
            RawArity::Detailed {
                parameters,
                bits: Some(bits),
                computation,
            } => Ok(InputRule::Computed {
                bits,
                formula: computation,
                parameters,
            }),
            RawArity::Detailed {
                computation: Some(_),
                ..
            } => Err("inputs computation requires bits".to_string()),
            RawArity::Detailed { parameters, .. } => Ok(InputRule::FromParameterList(parameters)),
        }
    }
}

impl From<InputRule> for RawArity {
    fn from(rule: InputRule) -> Self {
        match rule {
            InputRule::Fixed(n) => RawArity::Count(n),
            InputRule::FromParameterList(parameters) => RawArity::Detailed {
                parameters,
                bits: None,
                computation: None,
            },
            InputRule::Computed {
                bits,
                formula,
                parameters,
            } => RawArity::Detailed {
                parameters,
                bits: Some(bits),
                computation: formula,
            },
        }
    }
}

/// How many stack outputs an opcode produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawArity", into = "RawArity")]
pub enum OutputRule {
    /// Always exactly `n` outputs
    Fixed(usize),
    /// Derived from operand bits, optionally through a formula
    Computed {
        /// Bits holding the count
        bits: BitRange,
        /// Transformation of the extracted bits
        formula: Option<Formula>,
    },
}

impl OutputRule {
    /// Output count for a given operand; `None` if the formula cannot be evaluated
    pub fn count(&self, operand: u16) -> Option<usize> {
        match self {
            OutputRule::Fixed(n) => Some(*n),
            OutputRule::Computed { bits, formula } => computed_count(operand, *bits, formula.as_ref()),
        }
    }
}

impl TryFrom<RawArity> for OutputRule {
    type Error = String;

    fn try_from(raw: RawArity) -> Result<Self, Self::Error> {
        match raw {
            RawArity::Count(n) => Ok(OutputRule::Fixed(n)),
            RawArity::Detailed {
                bits: Some(bits),
                computation,
                ..
            } => Ok(OutputRule::Computed {
                bits,
                formula: computation,
            }),
            RawArity::Detailed { .. } => Err("outputs must be a number or specify bits".to_string()),
        }
    }
}

impl From<OutputRule> for RawArity {
    fn from(rule: OutputRule) -> Self {
        match rule {
            OutputRule::Fixed(n) => RawArity::Count(n),
            OutputRule::Computed { bits, formula } => RawArity::Detailed {
                parameters: Vec::new(),
                bits: Some(bits),
                computation: formula,
            },
        }
    }
}

fn computed_count(operand: u16, bits: BitRange, formula: Option<&Formula>) -> Option<usize> {
    let raw = i64::from(extract_bits(operand, bits));
    let count = match formula {
        Some(formula) => formula.eval(raw).ok()?,
        None => raw,
    };
    usize::try_from(count).ok()
}

/// One named operand argument and the bits it occupies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandArgMeta {
    /// Argument name; `inputs` receives the parameter count
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    /// Destination bits
    pub bits: BitRange,
    /// Transformation applied before storing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation: Option<Formula>,
    /// Accepted raw values
    #[serde(
        rename = "validRange",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub valid_range: Option<Vec<ValidRange>>,
}

impl OperandArgMeta {
    /// Whether this item is filled from the parameter count
    pub fn is_inputs(&self) -> bool {
        self.name == INPUTS_ARG
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawOperand {
    Zero(u64),
    Args(Vec<OperandArgMeta>),
}

/// How an opcode's operand is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOperand", into = "RawOperand")]
pub enum OperandRule {
    /// Operand is always zero and no `<...>` arguments are taken
    NoArgs,
    /// Operand packed from arguments
    ArgList(Vec<OperandArgMeta>),
}

impl TryFrom<RawOperand> for OperandRule {
    type Error = String;

    fn try_from(raw: RawOperand) -> Result<Self, Self::Error> {
        match raw {
            RawOperand::Zero(0) => Ok(OperandRule::NoArgs),
            RawOperand::Zero(n) => Err(format!("operand must be 0 or an argument list, found {}", n)),
            RawOperand::Args(args) if args.is_empty() => Ok(OperandRule::NoArgs),
            RawOperand::Args(args) => Ok(OperandRule::ArgList(args)),
        }
    }
}

impl From<OperandRule> for RawOperand {
    fn from(rule: OperandRule) -> Self {
        match rule {
            OperandRule::NoArgs => RawOperand::Zero(0),
            OperandRule::ArgList(args) => RawOperand::Args(args),
        }
    }
}

/// Metadata for one opcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpMeta {
    /// Primary name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    /// Alternative names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Operand construction
    pub operand: OperandRule,
    /// Stack inputs
    pub inputs: InputRule,
    /// Stack outputs
    pub outputs: OutputRule,
}

impl OpMeta {
    /// Operand argument items, empty for [`OperandRule::NoArgs`]
    pub fn operand_args(&self) -> &[OperandArgMeta] {
        match &self.operand {
            OperandRule::NoArgs => &[],
            OperandRule::ArgList(args) => args,
        }
    }

    /// Number of arguments written inside `<...>` (the `inputs` item excluded)
    pub fn user_arg_count(&self) -> usize {
        self.operand_args().iter().filter(|arg| !arg.is_inputs()).count()
    }

    /// Whether the opcode must be written with `<...>`
    pub fn takes_operand_args(&self) -> bool {
        self.user_arg_count() > 0
    }

    /// Expected input count for an operand
    pub fn input_count(&self, operand: u16) -> Option<usize> {
        self.inputs.count(operand)
    }

    /// Output count for an operand
    pub fn output_count(&self, operand: u16) -> Option<usize> {
        self.outputs.count(operand)
    }

    /// Pack user arguments and the parameter count into an operand.
    ///
    /// On failure returns the indices (into [`OpMeta::operand_args`]) of the
    /// rejected items. `args` must hold exactly [`OpMeta::user_arg_count`] values.
    pub fn pack_operand(&self, args: &[u32], param_count: usize) -> Result<u16, Vec<usize>> {
        let mut user_args = args.iter();
        let items: Vec<PackItem<'_>> = self
            .operand_args()
            .iter()
            .map(|arg| PackItem {
                value: if arg.is_inputs() {
                    u32::try_from(param_count).unwrap_or(u32::MAX)
                } else {
                    user_args.next().copied().unwrap_or_default()
                },
                range: arg.bits,
                formula: arg.computation.as_ref(),
                valid: arg.valid_range.as_deref(),
            })
            .collect();
        pack_bits(&items)
    }

    /// Recover the user arguments from an operand.
    ///
    /// Returns `None` when an item cannot be inverted or the recovered
    /// arguments do not pack back into the same operand.
    pub fn unpack_operand(&self, operand: u16, param_count: usize) -> Option<Vec<u32>> {
        let args = self
            .operand_args()
            .iter()
            .filter(|arg| !arg.is_inputs())
            .map(|arg| {
                let stored = extract_bits(operand, arg.bits);
                invert(arg.computation.as_ref(), stored, arg.bits.width())
            })
            .collect::<Option<Vec<u32>>>()?;

        let repacked = self.pack_operand(&args, param_count).ok()?;
        (repacked == operand).then_some(args)
    }

    /// Check the structural invariants of this entry
    pub fn validate(&self) -> Result<(), MetaError> {
        let invalid = |reason: String| MetaError::InvalidOpcode {
            name: self.name.clone(),
            reason,
        };

        if !is_word(&normalize_word(&self.name)) {
            return Err(invalid("name must match ^[a-z][a-z0-9-]*$".to_string()));
        }
        if let Some(alias) = self.aliases.iter().find(|a| !is_word(&normalize_word(a))) {
            return Err(invalid(format!("alias '{}' must match ^[a-z][a-z0-9-]*$", alias)));
        }

        let args = self.operand_args();
        if args.iter().filter(|arg| arg.is_inputs()).count() > 1 {
            return Err(invalid("more than one 'inputs' operand argument".to_string()));
        }
        let width: u32 = args.iter().map(|arg| u32::from(arg.bits.width())).sum();
        if width > 16 {
            return Err(invalid(format!("operand arguments use {} bits", width)));
        }
        for (i, a) in args.iter().enumerate() {
            if let Some(b) = args[i + 1..].iter().find(|b| a.bits.overlaps(&b.bits)) {
                return Err(invalid(format!(
                    "operand arguments '{}' {} and '{}' {} overlap",
                    a.name, a.bits, b.name, b.bits
                )));
            }
        }
        Ok(())
    }
}
